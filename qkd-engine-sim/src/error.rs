use std::path::PathBuf;

use bb84::{EntropyError, ProtocolError};
use thiserror::Error;

/// Errors that reach the caller of the engine.
///
/// Everything else (entropy fallbacks, an insecure QBER, an empty sifted key)
/// is reported through the result record and its log.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("required entropy tier unreachable: {0}")]
    ExternalHardware(#[from] EntropyError),

    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SimError::InputValidation(msg.into())
    }

    /// Whether the request was rejected before any simulation state changed.
    pub fn is_input_error(&self) -> bool {
        matches!(self, SimError::InputValidation(_) | SimError::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
