//! Generation report
//!
//! A pass never fails as a whole because of one bad entity. Everything that
//! was left out, and why, is collected here next to the counts.

use ha_core::{EntityId, EntityType, StateKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why an entity did not make it into the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The detected roles do not satisfy the type's minimum role set
    MissingRoles { roles: Vec<String> },
    /// Metadata marks the entity `enabled: false`
    Disabled,
    /// No controller in metadata, per-device settings or default
    NoController,
    /// The controller reference is not a `domain.object_id` id
    InvalidController { controller: String },
    /// Another entity already claimed the id
    DuplicateId,
    /// Metadata names a device the command table does not have
    UnknownDevice,
    /// Metadata maps a role to a command the device never learned
    UnknownCommand { command: String },
    /// An identifier could not be built
    InvalidId { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRoles { roles } => {
                write!(f, "missing required roles (has: {})", roles.join(", "))
            }
            SkipReason::Disabled => f.write_str("disabled"),
            SkipReason::NoController => f.write_str("no controller"),
            SkipReason::InvalidController { controller } => {
                write!(f, "invalid controller '{controller}'")
            }
            SkipReason::DuplicateId => f.write_str("duplicate entity id"),
            SkipReason::UnknownDevice => f.write_str("no learned commands for device"),
            SkipReason::UnknownCommand { command } => write!(f, "unknown command '{command}'"),
            SkipReason::InvalidId { message } => write!(f, "invalid id: {message}"),
        }
    }
}

/// One entity left out of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl SkippedEntity {
    pub fn new(device: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            device: device.into(),
            entity_id: None,
            entity_type: None,
            reason,
        }
    }

    pub fn with_entity(mut self, entity_id: Option<EntityId>, entity_type: EntityType) -> Self {
        self.entity_id = entity_id;
        self.entity_type = Some(entity_type);
        self
    }
}

impl fmt::Display for SkippedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.entity_id, self.entity_type) {
            (Some(id), _) => write!(f, "{} ({}): {}", id, self.device, self.reason),
            (None, Some(ty)) => write!(f, "{} on {}: {}", ty, self.device, self.reason),
            (None, None) => write!(f, "{}: {}", self.device, self.reason),
        }
    }
}

/// Summary of one generation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub total_entities: usize,
    pub per_type: BTreeMap<EntityType, usize>,
    pub state_variables: BTreeMap<StateKind, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GenerationReport {
    /// Number of entities of one type in the document
    pub fn count(&self, entity_type: EntityType) -> usize {
        self.per_type.get(&entity_type).copied().unwrap_or(0)
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}
