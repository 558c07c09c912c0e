//! Storage backend contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateResult;

/// Byte-oriented key/value persistence with optional per-entry TTL.
///
/// Implementations must be safe to call concurrently and must treat an
/// entry past its TTL as absent, whatever their eviction strategy. Callers
/// never assume the store is process-local.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Acquires resources. Called once before the first request is served.
    async fn startup(&self) -> StateResult<()> {
        Ok(())
    }

    /// Releases resources. Called once after the last request was served.
    async fn shutdown(&self) -> StateResult<()> {
        Ok(())
    }

    /// Stores `value` under `key`, replacing any previous entry.
    async fn store(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StateResult<()>;

    /// Reads the value under `key`.
    async fn get(&self, key: &str) -> StateResult<Option<Vec<u8>>>;

    /// Reads and deletes the value under `key` in one atomic step.
    ///
    /// Of any number of concurrent callers, at most one observes `Some`.
    async fn take(&self, key: &str) -> StateResult<Option<Vec<u8>>>;

    /// Deletes the value under `key`. Returns whether an entry existed.
    async fn remove(&self, key: &str) -> StateResult<bool>;

    /// Deletes every entry owned by this backend.
    async fn clear(&self) -> StateResult<()>;
}

/// A shared, type-erased backend.
pub type BoxedBackend = Arc<dyn StorageBackend>;
