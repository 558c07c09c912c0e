//! Process orchestration.
//!
//! [`QuillRuntime::run`] takes an [`Application`] from registration to a
//! serving endpoint and back down:
//!
//! ```text
//! config ─▶ logging ─▶ state backend startup ─▶ REST client ─▶ command sync
//!        ─▶ deletion worker ─▶ endpoint ─ … Ctrl+C / SIGTERM …
//!        ─▶ endpoint drains ─▶ worker stops ─▶ state backend shutdown
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quill_runtime::QuillRuntime;
//!
//! let mut app = Application::new();
//! app.command("echo", "Say hi").build(|| async { "hi" })?;
//!
//! QuillRuntime::builder()
//!     .config_file("quill.toml")
//!     .build(app)?
//!     .run()
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use quill_core::RestApi;
use quill_framework::{AppHandle, Application, ParentDeletions, run_deletion_worker};
use quill_state::{BoxedBackend, ManagedState, MemoryBackend};
use quill_transport::{HttpClient, Verifier, endpoint};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, ConfigLoader, QuillConfig, StateConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::sync::sync_commands;

/// Runs one [`Application`] as a webhook server.
pub struct QuillRuntime {
    config: QuillConfig,
    application: Application,
}

impl QuillRuntime {
    /// Creates a runtime builder loading configuration from the default
    /// locations.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Logging is initialized here so validation failures are reported
    /// through it.
    pub fn from_config(config: QuillConfig, application: Application) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        if let Err(e) = validate_config(&config) {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }

        info!(
            application_id = %config.application.id,
            commands = application.commands().len(),
            components = application.components().len(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );
        Ok(Self {
            config,
            application,
        })
    }

    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    ///
    /// The state backend is shut down on every exit path once it started.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let state = build_state(&self.config.state)?;
        state.startup().await?;
        info!(backend = state.backend().name(), "State backend started");

        let served = self.serve(state.clone(), shutdown).await;
        if let Err(e) = &served {
            error!(error = %e, "Runtime stopped with an error");
        }

        let stopped = state.shutdown().await;
        match &stopped {
            Ok(()) => info!("State backend stopped"),
            Err(e) => error!(error = %e, "State backend failed to stop"),
        }

        served?;
        stopped?;
        Ok(())
    }

    async fn serve<F>(self, state: ManagedState, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            config,
            application,
        } = self;
        let credentials = &config.application;

        let verifier = Verifier::from_hex(&credentials.public_key)?;
        let rest: Arc<dyn RestApi> = Arc::new(HttpClient::new(
            &credentials.token,
            credentials.id,
            config.http.to_client_config(),
        )?);

        if config.commands.sync_on_start {
            sync_commands(rest.as_ref(), application.commands(), &config.commands).await?;
        } else {
            debug!("Command sync disabled");
        }

        let listener = endpoint::bind(&config.server.address()).await?;

        let (deletions, receiver) = ParentDeletions::channel(config.dispatch.deletion_queue_size);
        let handle = AppHandle::new(credentials.id, state)
            .with_rest(Arc::clone(&rest))
            .with_deletions(deletions);
        let dispatcher =
            application.into_dispatcher(handle, config.dispatch.to_settings(&config.state));
        let router = endpoint::router(dispatcher, verifier, &config.server.path);

        let token = CancellationToken::new();
        let worker = tokio::spawn(run_deletion_worker(receiver, rest, token.child_token()));
        let mut server = tokio::spawn(endpoint::serve(listener, router, token.clone()));

        info!("Quill runtime is now running");
        let served = tokio::select! {
            joined = &mut server => joined,
            () = shutdown => {
                info!("Draining in-flight interactions");
                token.cancel();
                server.await
            }
        };
        token.cancel();

        if let Err(e) = worker.await {
            warn!(error = %e, "Parent deletion worker did not stop cleanly");
        }
        served.map_err(|e| RuntimeError::Task(e.to_string()))??;
        Ok(())
    }
}

/// Builds the managed state described by `config`. The backend is not
/// started.
pub fn build_state(config: &StateConfig) -> RuntimeResult<ManagedState> {
    let backend: BoxedBackend = match &config.backend {
        BackendConfig::Memory => {
            let mut memory = MemoryBackend::new();
            if let Some(interval) = config.sweep_interval() {
                memory = memory.with_sweep_interval(interval);
            }
            Arc::new(memory)
        }
        #[cfg(feature = "sqlite")]
        BackendConfig::Sqlite { path } => Arc::new(quill_state::SqliteBackend::new(path)),
        #[cfg(not(feature = "sqlite"))]
        BackendConfig::Sqlite { .. } => return Err(RuntimeError::BackendUnavailable("sqlite")),
        #[cfg(feature = "redis")]
        BackendConfig::Redis { url, key_prefix } => {
            let mut redis = quill_state::RedisBackend::new(url)?;
            if let Some(prefix) = key_prefix {
                redis = redis.with_key_prefix(prefix.clone());
            }
            Arc::new(redis)
        }
        #[cfg(not(feature = "redis"))]
        BackendConfig::Redis { .. } => return Err(RuntimeError::BackendUnavailable("redis")),
    };
    Ok(ManagedState::from_backend(backend).with_timeout(config.operation_timeout()))
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `QuillRuntime` with custom configuration.
///
/// ```rust,ignore
/// let runtime = QuillRuntime::builder()
///     .config_file("config/quill.toml")
///     .profile("production")
///     .build(app)?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, above every other source.
    pub fn merge(mut self, config: QuillConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime for `application`.
    pub fn build(self, application: Application) -> RuntimeResult<QuillRuntime> {
        let config = self.config_loader.load()?;
        QuillRuntime::from_config(config, application)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{RestError, Snowflake};
    use quill_framework::Application;

    const PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";

    fn config() -> QuillConfig {
        let mut config = QuillConfig::default();
        config.application.id = Snowflake::new(42);
        config.application.public_key = PUBLIC_KEY.into();
        config.application.token = "token".into();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config.http.api_base = "http://127.0.0.1:1".into();
        config.http.retry.max_retries = 0;
        config
    }

    fn app() -> Application {
        let mut app = Application::new();
        app.command("echo", "Say hi").build(|| async { "hi" }).unwrap();
        app
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let mut config = config();
        config.commands.sync_on_start = false;
        let runtime = QuillRuntime {
            config,
            application: app(),
        };
        tokio_test::assert_ok!(runtime.run_until(async {}).await);
    }

    #[tokio::test]
    async fn sync_failure_aborts_startup() {
        let runtime = QuillRuntime {
            config: config(),
            application: app(),
        };
        let result = runtime.run_until(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Sync(RestError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let result = QuillRuntime::from_config(QuillConfig::default(), app());
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn builds_memory_state() {
        let state = build_state(&StateConfig::default()).unwrap();
        assert_eq!(state.backend().name(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn builds_sqlite_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = StateConfig {
            backend: BackendConfig::Sqlite {
                path: dir.path().join("state.db"),
            },
            ..Default::default()
        };
        let state = build_state(&config).unwrap();
        state.startup().await.unwrap();
        state.namespace("test").set("k", &1u32, None).await.unwrap();
        assert_eq!(state.namespace("test").get::<u32>("k").await.unwrap(), Some(1));
        state.shutdown().await.unwrap();
    }
}
