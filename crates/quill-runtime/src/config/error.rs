//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a [`QuillConfig`](super::QuillConfig) could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// A source could not be parsed or extracted.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Config value rejected: {message}")]
    ValidationError { message: String },

    #[error("Required setting `{field}` is empty")]
    MissingField { field: String },

    #[error("Setting holds an unusable URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Port {0} cannot be listened on")]
    InvalidPort(u16),

    /// The application public key cannot verify signatures.
    #[error("Invalid application public key: {0}")]
    InvalidPublicKey(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::ParseError(error.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
