//! Outbound REST collaborator interface.
//!
//! The framework never talks HTTP to the platform directly. Command sync and
//! parent-message deletion go through [`RestApi`], implemented by
//! `quill_transport::HttpClient` and by test doubles.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::id::Snowflake;
use crate::model::{CommandSchema, CommandScope, RegisteredCommand};

/// Errors returned by the REST collaborator.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// Still rate limited after exhausting retries.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Delay requested by the platform.
        retry_after: Duration,
    },

    /// The platform answered with a 5xx status after exhausting retries.
    #[error("platform server error: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The request was rejected as malformed.
    #[error("bad request:\n{message}")]
    BadRequest {
        /// Flattened error description.
        message: String,
    },

    /// The token lacks access to the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other unsuccessful status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl RestError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Transport(_)
        )
    }
}

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;

/// Operations the framework needs from the platform's REST API.
#[async_trait]
pub trait RestApi: Send + Sync + 'static {
    /// Creates or overwrites a single command in `scope`.
    async fn register_command(
        &self,
        scope: CommandScope,
        schema: &CommandSchema,
    ) -> RestResult<RegisteredCommand>;

    /// Replaces every global command with `schemas`.
    async fn register_commands_bulk(
        &self,
        schemas: &[CommandSchema],
    ) -> RestResult<Vec<RegisteredCommand>>;

    /// Lists the registered global commands.
    async fn get_global_commands(&self) -> RestResult<Vec<RegisteredCommand>>;

    /// Deletes a global command.
    async fn delete_global_command(&self, command_id: Snowflake) -> RestResult<()>;

    /// Deletes the original response message of an interaction.
    async fn delete_interaction_message(&self, token: &str) -> RestResult<()>;
}
