//! Bounded pool for blocking handlers and checks.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::BoxError;

/// Default number of blocking handlers allowed to run at once.
pub const DEFAULT_BLOCKING_WORKERS: usize = 16;

/// Runs blocking closures on tokio's blocking threads, at most `size` at a
/// time. Further calls wait for a permit.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    /// Creates a pool with `size` permits (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Number of permits.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `f` on a blocking thread once a permit is free.
    pub async fn run<F, T>(&self, f: F) -> Result<T, BoxError>
    where
        F: FnOnce() -> Result<T, BoxError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await?;
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await?;
        joined
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKING_WORKERS)
    }
}
