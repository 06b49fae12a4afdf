use std::path::{Path, PathBuf};
use std::time::Duration;

use common::constants::{DEFAULT_MAIN_CIRCUIT, DEFAULT_RECURSIVE_CIRCUIT, DEFAULT_THREADS};
use serde::{Deserialize, Serialize};

use crate::backend::BackendOptions;
use crate::inputs::PublicInputEncoding;
use crate::utils::errors::ConfigError;

/// Settings for one pipeline run. Every field is optional in the TOML form.
///
/// ```toml
/// threads = 4
/// circuit_dir = "target/circuits"
/// public_input_encoding = "proven-value"
/// stage_timeout_secs = 600
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub threads: usize,
    pub main_circuit: String,
    pub recursive_circuit: String,
    /// Directory of `<name>.json` circuit artifacts. Builtin circuits are used
    /// when unset.
    pub circuit_dir: Option<PathBuf>,
    pub public_input_encoding: PublicInputEncoding,
    pub stage_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            main_circuit: DEFAULT_MAIN_CIRCUIT.to_string(),
            recursive_circuit: DEFAULT_RECURSIVE_CIRCUIT.to_string(),
            circuit_dir: None,
            public_input_encoding: PublicInputEncoding::default(),
            stage_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml_edit::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be positive".to_string()));
        }
        if self.main_circuit.is_empty() || self.recursive_circuit.is_empty() {
            return Err(ConfigError::Invalid("circuit names must not be empty".to_string()));
        }
        if self.main_circuit == self.recursive_circuit {
            return Err(ConfigError::Invalid(format!(
                "main and recursive circuit are both `{}`",
                self.main_circuit
            )));
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "stage_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            threads: self.threads,
        }
    }
}
