//! Application-wide error handlers, keyed by error type.
//!
//! Consulted after the check, command and component error handlers have
//! declined an error. The error's source chain is walked from the outside
//! in; the first link with a registered handler wins.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use quill_core::{Interaction, ResponsePayload};

use crate::callable::{ErrorHandler, IntoErrorHandler};
use crate::error::{
    AbortInvoke, BoxError, CheckError, InteractionExpired, UserMissingPermissions,
};
use crate::handler::{HandlerResult, Reply};
use crate::pool::BlockingPool;

type DynError = dyn StdError + 'static;

enum Fallback {
    Builtin(fn(&DynError) -> Option<Reply>),
    Custom(ErrorHandler),
}

struct Entry {
    name: &'static str,
    matches: fn(&DynError) -> bool,
    fallback: Fallback,
}

fn is<E: StdError + 'static>(error: &DynError) -> bool {
    error.is::<E>()
}

fn ephemeral_text<E: StdError + 'static>(error: &DynError) -> Option<Reply> {
    error
        .downcast_ref::<E>()
        .map(|e| Reply::Payload(ResponsePayload::ephemeral_message(e.to_string())))
}

fn aborted(error: &DynError) -> Option<Reply> {
    error
        .downcast_ref::<AbortInvoke>()
        .map(|abort| Reply::Response(abort.response.clone()))
}

/// Error handlers by error type.
pub struct ErrorHandlers {
    entries: HashMap<TypeId, Entry>,
}

impl ErrorHandlers {
    /// A table with the built-in handlers: [`CheckError`],
    /// [`UserMissingPermissions`] and [`InteractionExpired`] become ephemeral
    /// messages, [`AbortInvoke`] sends its response.
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.builtin::<CheckError>(ephemeral_text::<CheckError>);
        table.builtin::<UserMissingPermissions>(ephemeral_text::<UserMissingPermissions>);
        table.builtin::<InteractionExpired>(ephemeral_text::<InteractionExpired>);
        table.builtin::<AbortInvoke>(aborted);
        table
    }

    /// A table without any handler.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn builtin<E: StdError + 'static>(&mut self, f: fn(&DynError) -> Option<Reply>) {
        self.entries.insert(
            TypeId::of::<E>(),
            Entry {
                name: type_name::<E>(),
                matches: is::<E>,
                fallback: Fallback::Builtin(f),
            },
        );
    }

    /// Handles errors of type `E`, replacing any handler for that type.
    pub fn insert<E, M>(&mut self, handler: impl IntoErrorHandler<M>)
    where
        E: StdError + 'static,
    {
        self.entries.insert(
            TypeId::of::<E>(),
            Entry {
                name: type_name::<E>(),
                matches: is::<E>,
                fallback: Fallback::Custom(handler.into_error_handler()),
            },
        );
    }

    /// Whether errors of type `E` have a handler.
    pub fn contains<E: StdError + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<E>())
    }

    /// Number of handled error types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no error type is handled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve<'s>(&'s self, error: &DynError) -> Resolution<'s> {
        let mut link = Some(error);
        while let Some(current) = link {
            if let Some(entry) = self.entries.values().find(|e| (e.matches)(current)) {
                return match &entry.fallback {
                    Fallback::Builtin(f) => Resolution::Builtin(f(current)),
                    Fallback::Custom(handler) => Resolution::Custom(handler),
                };
            }
            link = current.source();
        }
        Resolution::Unclaimed
    }

    /// Handles `error`, or gives it back if no handler claims it.
    pub async fn handle(
        &self,
        interaction: Interaction,
        error: BoxError,
        pool: &BlockingPool,
    ) -> HandlerResult {
        match self.resolve(&*error) {
            Resolution::Builtin(Some(reply)) => Ok(reply),
            Resolution::Builtin(None) | Resolution::Unclaimed => Err(error),
            Resolution::Custom(handler) => handler.handle(interaction, error, pool).await,
        }
    }
}

enum Resolution<'s> {
    Unclaimed,
    Builtin(Option<Reply>),
    Custom(&'s ErrorHandler),
}

impl Default for ErrorHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|e| e.name))
            .finish()
    }
}
