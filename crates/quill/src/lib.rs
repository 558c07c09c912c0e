//! # Quill
//!
//! Chat bot interactions served over signed webhooks.
//!
//! ## Overview
//!
//! The platform POSTs every slash command, context-menu command, button
//! click, select choice and autocomplete request to one HTTP endpoint. Quill
//! verifies the request, routes it to a plain async (or blocking) function,
//! and turns whatever that function returns into the interaction response.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌─────────────┐
//! │ endpoint │──▶│ Verifier │──▶│ Dispatcher │──▶│ checks  │──▶│ handler     │
//! │  (axum)  │   │ (ed25519)│   │            │   │         │   │ (Callable)  │
//! └──────────┘   └──────────┘   └────────────┘   └─────────┘   └──────┬──────┘
//!                                      ▲                              │ Reply
//!                                      │                       ┌──────▼──────┐
//!                               ManagedState ◀─ InvokeContext ─│ normalize   │
//!                         (memory | sqlite | redis)            └─────────────┘
//! ```
//!
//! - **Dispatcher**: routes by interaction type, command name or component id
//! - **Checks**: ordered guards in front of a command
//! - **InvokeContext**: data a response attaches to its components, read back
//!   when one of them is clicked
//! - **ManagedState**: the key/value store holding those contexts, shared
//!   between worker processes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quill::prelude::*;
//!
//! #[derive(CommandOptions)]
//! struct EchoArgs {
//!     /// What to say
//!     text: String,
//! }
//!
//! async fn echo(Options(args): Options<EchoArgs>) -> String {
//!     args.text
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = Application::new();
//!     app.command("echo", "Repeat after me").build(echo)?;
//!
//!     QuillRuntime::builder().build(app)?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `sqlite` (default) / `redis`: state backends
//! - `json-log`: JSON log lines

pub use quill_core as core;
pub use quill_framework as framework;
pub use quill_runtime as runtime;
pub use quill_state as state;
pub use quill_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use quill::prelude::*;
/// ```
pub mod prelude {
    pub use quill_framework::prelude::*;

    // Runtime - main entry point
    pub use quill_runtime::{QuillConfig, QuillRuntime};

    // State - for handlers that keep their own data
    pub use quill_state::{ManagedState, Namespace};
}
