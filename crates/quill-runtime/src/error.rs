//! Runtime error types.

use quill_core::RestError;
use quill_state::StateError;
use quill_transport::{InvalidKey, TransportError};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that stop a runtime from starting or running.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The state backend failed to start or stop.
    #[error("State backend error: {0}")]
    State(#[from] StateError),

    /// The configured backend was compiled out.
    #[error("State backend '{0}' is not enabled; rebuild with the `{0}` feature")]
    BackendUnavailable(&'static str),

    /// The endpoint or REST client could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The public key is unusable.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    /// Publishing commands failed.
    #[error("Command sync failed: {0}")]
    Sync(#[from] RestError),

    /// A background task panicked.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
