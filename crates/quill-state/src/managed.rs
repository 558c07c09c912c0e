//! Namespaced, typed access to a storage backend.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::backend::{BoxedBackend, StorageBackend};
use crate::error::{StateError, StateResult};

/// Namespace holding invocation contexts of components.
pub const COMMAND_STATE: &str = "command-state";

/// Default bound on a single backend operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// A storage backend shared by the whole application.
///
/// Cheap to clone. Every operation is bounded by the configured timeout and
/// fails with [`StateError::Timeout`] instead of waiting forever.
#[derive(Clone)]
pub struct ManagedState {
    backend: BoxedBackend,
    timeout: Duration,
}

impl ManagedState {
    /// Wraps a backend.
    pub fn new(backend: impl StorageBackend) -> Self {
        Self::from_backend(Arc::new(backend))
    }

    /// Wraps an already shared backend.
    pub fn from_backend(backend: BoxedBackend) -> Self {
        Self {
            backend,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Sets the per-operation bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying backend.
    pub fn backend(&self) -> &BoxedBackend {
        &self.backend
    }

    /// Starts the backend.
    pub async fn startup(&self) -> StateResult<()> {
        self.bounded("startup", self.backend.startup()).await
    }

    /// Stops the backend.
    pub async fn shutdown(&self) -> StateResult<()> {
        self.bounded("shutdown", self.backend.shutdown()).await
    }

    /// A view whose keys are partitioned under `name`.
    pub fn namespace(&self, name: &str) -> Namespace {
        Namespace {
            state: self.clone(),
            prefix: Arc::from(format!("{name}:")),
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StateResult<T>>,
    ) -> StateResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = self.backend.name(),
                    op,
                    timeout = ?self.timeout,
                    "State operation timed out"
                );
                Err(StateError::Timeout {
                    op,
                    after: self.timeout,
                })
            }
        }
    }
}

impl fmt::Debug for ManagedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedState")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// JSON values stored under one logical domain.
///
/// Callers use bare keys; the domain prefix never leaks back out.
#[derive(Clone)]
pub struct Namespace {
    state: ManagedState,
    prefix: Arc<str>,
}

impl Namespace {
    /// Domain name, without the trailing separator.
    pub fn name(&self) -> &str {
        self.prefix.trim_end_matches(':')
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Stores `value` under `key`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StateResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let key = self.key(key);
        self.state
            .bounded("set", self.state.backend.store(&key, bytes, ttl))
            .await
    }

    /// Reads the value under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let key = self.key(key);
        let bytes = self
            .state
            .bounded("get", self.state.backend.get(&key))
            .await?;
        decode(bytes)
    }

    /// Reads and deletes the value under `key` atomically.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let key = self.key(key);
        let bytes = self
            .state
            .bounded("take", self.state.backend.take(&key))
            .await?;
        decode(bytes)
    }

    /// Deletes the value under `key`.
    pub async fn remove(&self, key: &str) -> StateResult<bool> {
        let key = self.key(key);
        self.state
            .bounded("remove", self.state.backend.remove(&key))
            .await
    }
}

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> StateResult<Option<T>> {
    bytes
        .map(|b| serde_json::from_slice(&b))
        .transpose()
        .map_err(StateError::from)
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name())
            .field("state", &self.state)
            .finish()
    }
}
