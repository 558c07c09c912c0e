//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use quill_core::Snowflake;
use quill_framework::DispatchSettings;
use quill_framework::deletion::DEFAULT_DELETION_QUEUE;
use quill_framework::dispatcher::{DEFAULT_COMPONENT_TTL, DEFAULT_FAILURE_MESSAGE};
use quill_framework::pool::DEFAULT_BLOCKING_WORKERS;
use quill_transport::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Platform credentials.
    pub application: ApplicationConfig,
    /// Interaction endpoint.
    pub server: ServerConfig,
    /// Managed state backend.
    pub state: StateConfig,
    /// Dispatcher tunables.
    pub dispatch: DispatchConfig,
    /// Outbound REST client.
    pub http: HttpConfig,
    /// Command publication.
    pub commands: CommandsConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

// =============================================================================
// Application
// =============================================================================

/// Credentials issued by the platform's developer portal.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application id.
    pub id: Snowflake,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    /// Bot token.
    pub token: String,
}

impl fmt::Debug for ApplicationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationConfig")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Server
// =============================================================================

/// Interaction endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path of the interaction route.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: quill_transport::endpoint::DEFAULT_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// State
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process store. State is lost on restart and not shared.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite { path: PathBuf },
    /// Redis server.
    Redis {
        url: String,
        #[serde(default)]
        key_prefix: Option<String>,
    },
}

/// Managed state configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub backend: BackendConfig,
    /// Lifetime of component contexts in seconds.
    pub component_ttl_secs: u64,
    /// Bound on every state operation in milliseconds.
    pub operation_timeout_ms: u64,
    /// Memory backend sweep period in seconds. `0` disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            component_ttl_secs: DEFAULT_COMPONENT_TTL.as_secs(),
            operation_timeout_ms: quill_state::DEFAULT_OPERATION_TIMEOUT.as_millis() as u64,
            sweep_interval_secs: 60,
        }
    }
}

impl StateConfig {
    pub fn component_ttl(&self) -> Duration {
        Duration::from_secs(self.component_ttl_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Blocking handlers allowed to run at once.
    pub blocking_workers: usize,
    /// Ephemeral reply sent when an error reaches no handler.
    pub failure_message: String,
    /// Pending parent deletions before new ones are dropped.
    pub deletion_queue_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            blocking_workers: DEFAULT_BLOCKING_WORKERS,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            deletion_queue_size: DEFAULT_DELETION_QUEUE,
        }
    }
}

impl DispatchConfig {
    /// Dispatcher settings, with the component TTL taken from `state`.
    pub fn to_settings(&self, state: &StateConfig) -> DispatchSettings {
        DispatchSettings {
            component_ttl: state.component_ttl(),
            failure_message: self.failure_message.clone(),
            blocking_workers: self.blocking_workers,
        }
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// REST client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// API root URL.
    pub api_base: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_ms: 30000,
            retry: RetryConfig::default(),
        }
    }
}

impl HttpConfig {
    /// Converts to the transport client config.
    pub fn to_client_config(&self) -> quill_transport::HttpClientConfig {
        quill_transport::HttpClientConfig {
            api_base: self.api_base.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            retry: self.retry.to_transport_retry(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Converts to the transport retry policy.
    pub fn to_transport_retry(&self) -> quill_transport::RetryConfig {
        quill_transport::RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Command publication at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Publish commands before serving.
    pub sync_on_start: bool,
    /// Delete global commands that are no longer registered.
    pub remove_stale_global: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            sync_on_start: true,
            remove_stale_global: true,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Machine-readable JSON lines. Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
    #[default]
    Compact,
    Full,
    Pretty,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Appends to [`LoggingConfig::file_path`].
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file when `output` is `file`.
    pub file_path: Option<PathBuf>,
    pub span_events: SpanEventConfig,
    /// Include thread ids.
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    /// Per-module levels, e.g. `quill_state = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}
