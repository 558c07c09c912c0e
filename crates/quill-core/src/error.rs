//! Errors raised while building or validating wire model values.
//!
//! Routing and dispatch errors live in `quill-framework`; collaborator
//! errors live in [`crate::rest`].

use thiserror::Error;

/// Errors raised by model validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A component custom identifier cannot be used.
    #[error("invalid custom id '{id}': {reason}")]
    InvalidCustomId {
        /// The offending identifier.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A command or option name cannot be used.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A text field exceeds the platform's limit.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },
}

impl ModelError {
    /// Creates an invalid custom id error.
    pub fn invalid_custom_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCustomId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;
