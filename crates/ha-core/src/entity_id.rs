//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::slug::is_slug;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error(
        "domain contains invalid characters (must be lowercase alphanumeric with underscores, cannot start/end with underscore or contain double underscores)"
    )]
    InvalidDomainChars,

    #[error(
        "object_id contains invalid characters (must be lowercase alphanumeric with underscores, cannot start/end with underscore or contain double underscores)"
    )]
    InvalidObjectIdChars,
}

/// A `domain.object_id` reference (e.g. `fan.office_ceiling_fan`)
///
/// Used for generated entities, for the helper entities that hold their
/// synthetic state and for the transmitter entities commands are sent through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if !is_slug(&domain) {
            return Err(EntityIdError::InvalidDomainChars);
        }
        if !is_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }

        Ok(Self { domain, object_id })
    }

    /// Get the domain part of the entity ID
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Get the object_id part of the entity ID
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 2 {
            return Err(EntityIdError::InvalidFormat);
        }
        Self::new(parts[0], parts[1])
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entity_id() {
        let id = EntityId::new("fan", "office_ceiling_fan").unwrap();
        assert_eq!(id.domain(), "fan");
        assert_eq!(id.object_id(), "office_ceiling_fan");
        assert_eq!(id.to_string(), "fan.office_ceiling_fan");
    }

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "remote.broadlink_living_room".parse().unwrap();
        assert_eq!(id.domain(), "remote");
        assert_eq!(id.object_id(), "broadlink_living_room");
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "too.many.parts".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
    }

    #[test]
    fn test_empty_parts() {
        assert_eq!(
            ".object".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyDomain
        );
        assert_eq!(
            "domain.".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyObjectId
        );
    }

    #[test]
    fn test_invalid_chars() {
        assert_eq!(
            "Remote.rm4".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
        assert_eq!(
            "remote.RM4".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
        assert_eq!(
            "my__remote.rm4".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomainChars
        );
    }

    #[test]
    fn test_object_id_must_be_a_slug() {
        assert_eq!(
            "switch.office__heater".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
        assert_eq!(
            EntityId::new("light", "_lamp").unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
    }

    #[test]
    fn test_ordering_is_domain_then_object() {
        let a: EntityId = "fan.b".parse().unwrap();
        let b: EntityId = "light.a".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = EntityId::new("input_select", "office_fan_speed").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"input_select.office_fan_speed\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
