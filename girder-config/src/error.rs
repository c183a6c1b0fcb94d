// Error types for configuration loading

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for girder_core::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(msg) => girder_core::Error::Validation(msg),
            ConfigError::IoError(io) => girder_core::Error::Io(io),
            other => girder_core::Error::Internal(other.to_string()),
        }
    }
}
