//! Quill Runtime - configuration, logging and process orchestration.
//!
//! This crate provides:
//! - Layered configuration (`QuillConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - Command publication at startup (`sync_commands`)
//! - The process lifecycle (`QuillRuntime`)
//!
//! ```ignore
//! use quill_framework::Application;
//! use quill_runtime::QuillRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut app = Application::new();
//!     app.command("ping", "Are you there?").build(|| async { "pong" })?;
//!
//!     // Reads quill.toml and QUILL_* variables, runs until Ctrl+C
//!     QuillRuntime::builder().build(app)?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod sync;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, QuillConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{QuillRuntime, RuntimeBuilder, build_state, wait_for_shutdown};
pub use sync::{SyncReport, sync_commands};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
