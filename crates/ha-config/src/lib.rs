//! Settings and input loading for the remote entity generator
//!
//! Every input of a generation pass is a YAML or JSON document: the command
//! table learned from the transmitters, the per-entity metadata and the
//! generator settings. YAML documents may use:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{load_document, SynthConfig};
//!
//! let settings = SynthConfig::load("synth.yaml")?;
//! let commands: CommandTable = load_document("codes.json")?;
//! ```

mod error;
mod loader;
mod synth_config;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_document, load_yaml, YamlLoader};
pub use synth_config::SynthConfig;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
