//! Domain vocabulary
//!
//! The entity domains the generator emits and the helper domains that carry
//! synthetic state for hardware that cannot report its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for an unrecognized domain name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity type '{0}'")]
pub struct UnknownEntityType(pub String);

/// Kind of virtual entity produced from a remote's commands.
///
/// Variant order is the order groups appear in a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Light,
    Fan,
    Switch,
    MediaPlayer,
    Cover,
    /// Stateless push action for a command no other entity consumed
    Button,
}

impl EntityType {
    /// Domain string, also used as the entity id domain
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Light => "light",
            EntityType::Fan => "fan",
            EntityType::Switch => "switch",
            EntityType::MediaPlayer => "media_player",
            EntityType::Cover => "cover",
            EntityType::Button => "button",
        }
    }

    /// Human readable name used in friendly names
    pub fn title(self) -> &'static str {
        match self {
            EntityType::Light => "Light",
            EntityType::Fan => "Fan",
            EntityType::Switch => "Switch",
            EntityType::MediaPlayer => "Media Player",
            EntityType::Cover => "Cover",
            EntityType::Button => "Button",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(EntityType::Light),
            "fan" => Ok(EntityType::Fan),
            "switch" => Ok(EntityType::Switch),
            "media_player" => Ok(EntityType::MediaPlayer),
            "cover" => Ok(EntityType::Cover),
            "button" => Ok(EntityType::Button),
            other => Err(UnknownEntityType(other.to_string())),
        }
    }
}

/// Kind of synthetic state variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Boolean,
    Enum,
    Numeric,
}

impl StateKind {
    /// Helper domain the variable is materialized in
    pub fn helper_domain(self) -> &'static str {
        match self {
            StateKind::Boolean => "input_boolean",
            StateKind::Enum => "input_select",
            StateKind::Numeric => "input_number",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Boolean => f.write_str("boolean"),
            StateKind::Enum => f.write_str("enum"),
            StateKind::Numeric => f.write_str("numeric"),
        }
    }
}
