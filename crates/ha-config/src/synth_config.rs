//! Generator settings
//!
//! Parses the settings document that tells the generator which transmitter
//! each device's commands go through and how to tune its naming heuristics.

use ha_core::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_document;

/// Settings for one generation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Transmitter used when neither the entity metadata nor `controllers`
    /// names one (e.g. `remote.broadlink_rm4`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_controller: Option<String>,

    /// Per-device transmitter, keyed by device name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub controllers: BTreeMap<String, String>,

    /// Extra device-type words for area extraction
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub area_vocabulary: Vec<String>,

    /// Extra room words for possessive detection (`moms_studio`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub room_words: Vec<String>,

    /// Expose commands no entity consumed as buttons
    pub emit_buttons: bool,

    /// Keep `enabled: false` entities in the document instead of skipping them
    pub include_disabled: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            default_controller: None,
            controllers: BTreeMap::new(),
            area_vocabulary: Vec::new(),
            room_words: Vec::new(),
            emit_buttons: true,
            include_disabled: false,
        }
    }
}

impl SynthConfig {
    /// Load settings from a YAML or JSON file and validate them
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config: Self = load_document(path.as_ref())?;
        config.validate()?;
        debug!(
            "Loaded generator settings: {} device controllers, default {:?}",
            config.controllers.len(),
            config.default_controller
        );
        Ok(config)
    }

    /// Controller references must be `domain.object_id` entity ids
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(controller) = &self.default_controller {
            check_controller("default_controller", controller)?;
        }
        for (device, controller) in &self.controllers {
            check_controller(&format!("controllers.{device}"), controller)?;
        }
        Ok(())
    }

    /// Configured controller for a device, falling back to the default
    pub fn controller_for(&self, device: &str) -> Option<&str> {
        self.controllers
            .get(device)
            .or(self.default_controller.as_ref())
            .map(String::as_str)
    }
}

fn check_controller(key: &str, controller: &str) -> ConfigResult<()> {
    controller
        .parse::<EntityId>()
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SynthConfig::default();
        assert!(config.default_controller.is_none());
        assert!(config.emit_buttons);
        assert!(!config.include_disabled);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config: SynthConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SynthConfig::default());
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
default_controller: remote.rm4_pro
controllers:
  bedroom_tv: remote.rm_mini_bedroom
area_vocabulary: [dehumidifier]
room_words: [studio]
emit_buttons: false
include_disabled: true
"#;
        let config: SynthConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_controller.as_deref(), Some("remote.rm4_pro"));
        assert_eq!(config.controller_for("bedroom_tv"), Some("remote.rm_mini_bedroom"));
        assert_eq!(config.controller_for("office_fan"), Some("remote.rm4_pro"));
        assert_eq!(config.area_vocabulary, vec!["dehumidifier".to_string()]);
        assert!(!config.emit_buttons);
        assert!(config.include_disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_controller_for_without_default() {
        let config = SynthConfig::default();
        assert_eq!(config.controller_for("office_fan"), None);
    }

    #[test]
    fn test_validate_rejects_bad_controller() {
        let mut config = SynthConfig::default();
        config
            .controllers
            .insert("den_tv".to_string(), "Remote RM4".to_string());
        match config.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "controllers.den_tv"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("synth.yaml");
        std::fs::write(&path, "default_controller: remote.rm4\n").unwrap();

        let config = SynthConfig::load(&path).unwrap();
        assert_eq!(config.default_controller.as_deref(), Some("remote.rm4"));
    }
}
