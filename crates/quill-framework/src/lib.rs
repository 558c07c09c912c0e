//! # Quill Framework
//!
//! Interaction routing for Quill applications.
//!
//! This layer provides:
//! - Axum-style handlers: plain functions whose parameters are extracted from
//!   the interaction ([`Handler`], [`FromInvocation`])
//! - A uniform [`Callable`] over async and blocking handlers
//! - Command and component registries with builder-style registration
//! - Ordered [`Check`] pipelines gating command invocation
//! - Response normalization that mints invocation references and persists
//!   their [`InvokeContext`] before the response leaves the process
//! - The [`Dispatcher`], also usable as a `tower::Service<Interaction>`
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_framework::prelude::*;
//!
//! #[derive(CommandOptions)]
//! struct EchoArgs {
//!     #[option(description = "What to say")]
//!     text: String,
//! }
//!
//! async fn echo(Options(args): Options<EchoArgs>) -> String {
//!     args.text
//! }
//!
//! let mut app = Application::new();
//! app.command("echo", "Repeat after me").build(echo)?;
//! let dispatcher = app.into_dispatcher(handle, DispatchSettings::default());
//! ```

extern crate self as quill_framework;

pub mod app;
pub mod callable;
pub mod check;
pub mod command;
pub mod component;
pub mod context;
pub mod deletion;
pub mod dispatcher;
pub mod error;
pub mod error_handlers;
pub mod extractor;
pub mod handler;
pub mod normalize;
pub mod options;
pub mod pool;
pub mod response;

pub use app::{AppHandle, Application};
pub use callable::{Blocking, Callable, ErrorHandler, IntoCallable, IntoErrorHandler, blocking};
pub use check::{Check, CheckPipeline, require_user_permissions};
pub use command::{Command, CommandBuilder, CommandHandle, CommandRegistry};
pub use component::{ButtonBuilder, Component, ComponentRegistry, SelectBuilder, link};
pub use context::InvokeContext;
pub use deletion::{DeletionReceiver, ParentDeletions, run_deletion_worker};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::{
    AbortInvoke, BoxError, CheckError, DispatchError, ExtractError, ExtractResult,
    InteractionExpired, OptionError, RegistryError, ResponseError, UserMissingPermissions,
};
pub use error_handlers::ErrorHandlers;
pub use extractor::{
    Focused, FromInvocation, Invocation, Options, ParamSpec, Selected, Target, TargetEntity,
    TargetKind,
};
pub use handler::{BlockingHandler, Handler, HandlerResult, IntoReply, Reply};
pub use options::{CommandOptions, Mentionable, OptionValue, ResolvedOptions};
pub use pool::BlockingPool;
pub use quill_macros::{CommandOptions, OptionChoice};
pub use response::{ComponentRef, Response};

#[doc(hidden)]
pub mod __private {
    pub use quill_core::{CommandChoice, CommandOption, CommandOptionType, ResolvedData};
    pub use serde_json::Value;
}

/// Everything a handler module usually imports.
pub mod prelude {
    pub use crate::{
        AbortInvoke, AppHandle, Application, Check, CheckError, CommandOptions, ComponentRef,
        DispatchSettings, Dispatcher, Focused, InvokeContext, OptionChoice, Options, Response,
        Selected, Target, blocking, link, require_user_permissions,
    };
    pub use quill_core::{
        ButtonStyle, CompletedOption, Embed, Interaction, Member, Message, PartialChannel,
        PartialEmoji, Permissions, Role, SelectOption, User,
    };
}
