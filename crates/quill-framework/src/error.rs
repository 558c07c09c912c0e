//! Error types for the Quill framework.
//!
//! Errors fall in two groups. Registration and dispatch errors
//! ([`RegistryError`], [`DispatchError`]) are for the application developer
//! and the HTTP layer. The user-facing errors ([`CheckError`],
//! [`UserMissingPermissions`], [`AbortInvoke`], [`InteractionExpired`]) are
//! raised from checks and handlers and are turned into responses by the
//! default fallback table.

use quill_core::{ModelError, Permissions};
use quill_state::StateError;
use thiserror::Error;

use crate::response::Response;

/// Type-erased error returned by handlers, checks and error handlers.
pub type BoxError = tower::BoxError;

// ============================================================================
// Extraction
// ============================================================================

/// A single option value could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// A required option was not sent.
    #[error("missing required option '{name}'")]
    Missing {
        /// Option name.
        name: String,
    },

    /// The option was sent with a value of the wrong shape.
    #[error("invalid value for option '{name}': {reason}")]
    Invalid {
        /// Option name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

impl OptionError {
    /// Creates an invalid-value error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while binding handler parameters.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The handler requires an invocation context that does not exist.
    #[error("no invocation context available")]
    MissingContext,

    /// A `Selected` parameter on something other than a select menu.
    #[error("interaction carries no selected values")]
    NoSelection,

    /// A `Focused` parameter outside of autocomplete.
    #[error("interaction has no focused option")]
    NoFocusedOption,

    /// A context-menu target was requested but not resolved.
    #[error("context-menu target could not be resolved")]
    NoTarget,

    /// Binding command options failed.
    #[error(transparent)]
    Options(#[from] OptionError),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

// ============================================================================
// Registration
// ============================================================================

/// Errors raised while registering commands and components.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The name or custom id is already taken in its scope.
    #[error("{kind} '{name}' is already registered{scope}")]
    Duplicate {
        /// "command" or "component".
        kind: &'static str,
        /// Offending name.
        name: String,
        /// Scope suffix for messages, empty for components.
        scope: String,
    },

    /// A name or custom id is not acceptable to the platform.
    #[error(transparent)]
    InvalidName(#[from] ModelError),

    /// Descriptions must be 1-100 characters.
    #[error("description of '{name}' must be 1-100 characters")]
    InvalidDescription {
        /// Command or option name.
        name: String,
    },

    /// More than one `InvokeContext` parameter.
    #[error("handler of '{name}' declares more than one invocation context parameter")]
    MultipleContextParams {
        /// Command or component name.
        name: String,
    },

    /// More than one `Options<T>` parameter.
    #[error("handler of '{name}' declares more than one options parameter")]
    MultipleOptionParams {
        /// Command name.
        name: String,
    },

    /// A parameter that makes no sense for this kind of handler.
    #[error("handler of '{name}' cannot take a {param} parameter")]
    UnsupportedParam {
        /// Command or component name.
        name: String,
        /// Parameter description.
        param: &'static str,
    },

    /// An autocomplete handler names an option the command does not have.
    #[error("command '{command}' has no string option '{option}' to autocomplete")]
    UnknownOption {
        /// Command name.
        command: String,
        /// Option name.
        option: String,
    },
}

// ============================================================================
// Response normalization
// ============================================================================

/// A handler produced a response the platform would reject.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// More than five rows.
    #[error("a message may have at most 5 component rows, got {0}")]
    TooManyRows(usize),

    /// A row without components.
    #[error("component row {row} is empty")]
    EmptyRow {
        /// Row index.
        row: usize,
    },

    /// More than five components in one row.
    #[error("component row {row} has {count} components, at most 5 are allowed")]
    TooManyComponents {
        /// Row index.
        row: usize,
        /// Component count.
        count: usize,
    },

    /// A select menu shares its row with other components.
    #[error("select menu in row {row} must be alone in its row")]
    SelectNotAlone {
        /// Row index.
        row: usize,
    },

    /// Message content longer than 2000 characters.
    #[error("message content is {0} characters, at most 2000 are allowed")]
    ContentTooLong(usize),

    /// Autocomplete handlers must return choices.
    #[error("autocomplete handlers must return choices")]
    UnexpectedAutocompleteReply,

    /// Writing an invocation context failed.
    #[error(transparent)]
    State(#[from] StateError),
}

// ============================================================================
// Dispatch
// ============================================================================

/// Errors surfaced by the [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No command with this name in the guild or globally.
    #[error("no command named '{0}' is registered")]
    CommandNotFound(String),

    /// No component with this base custom id.
    #[error("no component with custom id '{0}' is registered")]
    ComponentNotFound(String),

    /// The interaction is malformed for its type.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Interaction type this framework does not handle.
    #[error("unsupported interaction type {0}")]
    UnsupportedType(u8),

    /// A handler error no error handler claimed.
    #[error("unhandled error in '{target}' (interaction {interaction_id}): {source}")]
    Unhandled {
        /// Command name or component id.
        target: String,
        /// Interaction id.
        interaction_id: String,
        /// The error.
        source: BoxError,
    },
}

impl DispatchError {
    /// Whether the request itself was at fault (HTTP 400).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Unhandled { .. })
    }
}

// ============================================================================
// User-facing errors
// ============================================================================

/// A check rejected the invocation. The message is shown to the user.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CheckError {
    /// Text shown to the invoking user.
    pub message: String,
}

impl CheckError {
    /// Creates a check error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The invoking member lacks permissions a check requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("You are missing the required permissions: {}", permission_list(.missing))]
pub struct UserMissingPermissions {
    /// Permissions the member does not have.
    pub missing: Permissions,
}

fn permission_list(missing: &Permissions) -> String {
    missing
        .names()
        .iter()
        .map(|name| title_case(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Stops the invocation and answers with a prepared response.
#[derive(Debug, Error)]
#[error("invocation aborted")]
pub struct AbortInvoke {
    /// Response sent instead.
    pub response: Response,
}

impl AbortInvoke {
    /// Aborts with `response`.
    pub fn new(response: impl Into<Response>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

/// The invocation context of a component is gone.
#[derive(Debug, Clone, Error)]
#[error("This interaction has expired.")]
pub struct InteractionExpired {
    /// Reference carried by the clicked component, if any.
    pub reference_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_permissions_message_lists_names() {
        let err = UserMissingPermissions {
            missing: Permissions::MANAGE_MESSAGES | Permissions::BAN_MEMBERS,
        };
        assert_eq!(
            err.to_string(),
            "You are missing the required permissions: Ban Members, Manage Messages"
        );
    }

    #[test]
    fn only_unhandled_is_a_server_error() {
        assert!(DispatchError::CommandNotFound("x".into()).is_client_error());
        assert!(DispatchError::UnsupportedType(9).is_client_error());
        let unhandled = DispatchError::Unhandled {
            target: "x".into(),
            interaction_id: "1".into(),
            source: "boom".into(),
        };
        assert!(!unhandled.is_client_error());
    }
}
