//! Configuration for a Quill process.
//!
//! Layered loading with figment (defaults, files, `QUILL_*` environment,
//! programmatic overrides) and validation of the merged result.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    ApplicationConfig, BackendConfig, CommandsConfig, DispatchConfig, HttpConfig, LogFormat,
    LogLevel, LogOutput, LoggingConfig, QuillConfig, RetryConfig, ServerConfig, SpanEventConfig,
    StateConfig,
};
pub use validation::validate_config;
