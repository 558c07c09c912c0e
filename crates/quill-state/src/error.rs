//! State error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by storage backends and the managed state layer.
#[derive(Debug, Error)]
pub enum StateError {
    /// The backend failed to execute an operation.
    #[error("{backend} backend error: {message}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// Failure description.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("failed to (de)serialize state value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation exceeded the configured bound.
    #[error("state operation '{op}' timed out after {after:?}")]
    Timeout {
        /// Operation name.
        op: &'static str,
        /// Configured bound.
        after: Duration,
    },

    /// The backend has not been started or was shut down.
    #[error("{0} backend is not running")]
    NotRunning(&'static str),
}

impl StateError {
    /// Creates a backend error.
    pub fn backend(backend: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend,
            message: message.to_string(),
        }
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
