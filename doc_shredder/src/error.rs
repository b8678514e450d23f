//! Error types for doc_shredder

use thiserror::Error;

/// Result type for doc_shredder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for doc_shredder
///
/// Only conditions that stop a run live here. Recoverable findings such as
/// unmatched tables or missing keys are reported as
/// [`Warning`](crate::compare::Warning) values instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Structure error: {0}")]
    StructureError(String),

    #[error("Naming collision could not be resolved for '{0}'")]
    NamingCollisionExhausted(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Convert Serde JSON errors to doc_shredder errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert YAML decoding errors to doc_shredder errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::DecodeError(error.to_string())
    }
}

/// Convert TOML deserialization errors to doc_shredder errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
