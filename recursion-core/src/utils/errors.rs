use std::time::Duration;

use common::field_conversion::FieldError;
use thiserror::Error;

use crate::codec::CodecError;
use crate::pipeline::progress::Stage;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Missing input for parameter `{0}`")]
    Missing(String),
    #[error("Unexpected input `{0}`")]
    Unexpected(String),
    #[error("Input `{name}` does not match its type, expected {expected}")]
    Shape { name: String, expected: String },
    #[error("Invalid value for `{name}`: {source}")]
    Field {
        name: String,
        #[source]
        source: FieldError,
    },
    #[error("Input `{0}` must be a decimal integer under the raw-decimal encoding")]
    NotDecimal(String),
    #[error("Expected {expected} public inputs on the intermediate proof, found {actual}")]
    PublicInputCount { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Circuit `{0}` not found")]
    NotFound(String),
    #[error("Could not read circuit `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Compilation failed for circuit `{name}`: {reason}")]
    Compilation { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProvingError {
    #[error("Backend for circuit `{0}` was used before init")]
    NotInitialized(String),
    #[error("Backend for circuit `{0}` has been destroyed")]
    Destroyed(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Witness was produced by a different circuit than `{0}`")]
    WitnessMismatch(String),
    #[error("Proof carries {actual} public inputs, expected {expected}")]
    PublicInputCount { expected: usize, actual: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml_edit::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ProvingError,
    },
    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },
    #[error("{stage} timed out after {after:?}")]
    TimedOut { stage: Stage, after: Duration },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Load(_) => Some(Stage::Setup),
            // Inputs are checked before the first stage starts.
            PipelineError::Input(_) => None,
            PipelineError::Stage { stage, .. }
            | PipelineError::Cancelled { stage }
            | PipelineError::TimedOut { stage, .. } => Some(*stage),
        }
    }
}
