//! Inputs of a generation pass
//!
//! Both tables are supplied wholesale by their owners and only read here.

use ha_core::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Learned codes per device: `{device_name: {command_name: code}}`.
///
/// Codes are opaque; the generator never looks inside them.
pub type CommandTable = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// One learned command, borrowed from a [`CommandTable`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCommand<'a> {
    pub device: &'a str,
    pub command: &'a str,
    pub code: &'a serde_json::Value,
}

/// Stored metadata for one entity, keyed by entity id in [`CompileInput`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Explicit type. With `commands` set this defines the entity outright;
    /// without it the record only overrides an auto-detected entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,

    /// Device whose commands the entity uses
    pub device: String,

    /// Role to command name (e.g. `turn_on: power_on`)
    #[serde(default, alias = "roles", skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,

    /// Transmitter entity the commands are sent through
    #[serde(
        default,
        alias = "controller_reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub controller: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EntityMetadata {
    /// Metadata record for a device with every optional field unset
    pub fn for_device(device: impl Into<String>) -> Self {
        Self {
            entity_type: None,
            device: device.into(),
            commands: BTreeMap::new(),
            controller: None,
            friendly_name: None,
            icon: None,
            area: None,
            enabled: true,
        }
    }

    /// Whether this record defines an entity on its own
    pub fn is_explicit(&self) -> bool {
        self.entity_type.is_some() && !self.commands.is_empty()
    }
}

/// Everything a generation pass reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileInput {
    /// Entity metadata keyed by entity id (`fan.office_fan` or `office_fan`)
    #[serde(default)]
    pub entities: BTreeMap<String, EntityMetadata>,

    /// Learned command table
    #[serde(default)]
    pub commands: CommandTable,
}

impl CompileInput {
    /// Input with a command table and no metadata
    pub fn new(commands: CommandTable) -> Self {
        Self {
            entities: BTreeMap::new(),
            commands,
        }
    }

    /// Attach entity metadata
    pub fn with_entities(mut self, entities: BTreeMap<String, EntityMetadata>) -> Self {
        self.entities = entities;
        self
    }

    /// Every learned command, ordered by device then command name
    pub fn raw_commands(&self) -> impl Iterator<Item = RawCommand<'_>> {
        self.commands.iter().flat_map(|(device, commands)| {
            commands.iter().map(move |(command, code)| RawCommand {
                device,
                command,
                code,
            })
        })
    }

    /// Metadata records that belong to a device, ordered by key
    pub fn metadata_for_device<'a>(
        &'a self,
        device: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a EntityMetadata)> + 'a {
        self.entities
            .iter()
            .filter(move |(_, meta)| meta.device == device)
    }
}
