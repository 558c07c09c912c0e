//! In-process storage backend.
//!
//! Suitable for single-process deployments and tests. Entries past their
//! TTL are dropped on read; an optional background sweep reclaims entries
//! nobody reads again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::backend::StorageBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::StateResult;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<u64>,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// A `HashMap` behind a single lock.
///
/// [`take`](StorageBackend::take) is a plain `remove` under that lock, so at
/// most one of any number of concurrent callers gets the value.
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Option<Duration>,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend on the system clock without a sweeper.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(SystemClock),
            sweep_interval: None,
            sweeper: Mutex::new(None),
        }
    }

    /// Uses `clock` to evaluate TTLs.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sweeps expired entries every `interval` once started.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, self.clock.as_ref())
    }
}

fn purge(entries: &Mutex<HashMap<String, Entry>>, clock: &dyn Clock) -> usize {
    let now = clock.now_millis();
    let mut entries = entries.lock();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn startup(&self) -> StateResult<()> {
        let Some(interval) = self.sweep_interval else {
            return Ok(());
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.sweeper.lock().replace(token.clone()) {
            previous.cancel();
        }

        let entries = Arc::clone(&self.entries);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = purge(&entries, clock.as_ref());
                        if purged > 0 {
                            trace!(purged, "Swept expired state entries");
                        }
                    }
                }
            }
            debug!("Memory state sweeper stopped");
        });

        Ok(())
    }

    async fn shutdown(&self) -> StateResult<()> {
        if let Some(token) = self.sweeper.lock().take() {
            token.cancel();
        }
        Ok(())
    }

    async fn store(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StateResult<()> {
        let entry = Entry {
            value,
            expires_at: self.clock.expiry(ttl),
        };
        self.entries.lock().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn take(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let now = self.clock.now_millis();
        let entry = self.entries.lock().remove(key);
        Ok(entry.filter(|e| e.is_live(now)).map(|e| e.value))
    }

    async fn remove(&self, key: &str) -> StateResult<bool> {
        let now = self.clock.now_millis();
        let entry = self.entries.lock().remove(key);
        Ok(entry.is_some_and(|e| e.is_live(now)))
    }

    async fn clear(&self) -> StateResult<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio_test::assert_ok;

    fn backend_with_clock() -> (MemoryBackend, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let backend = MemoryBackend::new().with_clock(clock.clone());
        (backend, clock)
    }

    #[tokio::test]
    async fn store_get_remove() {
        let backend = MemoryBackend::new();
        assert_ok!(backend.store("k", b"v".to_vec(), None).await);
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(backend.remove("k").await.unwrap());
        assert!(!backend.remove("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_on_the_clock() {
        let (backend, clock) = backend_with_clock();
        backend
            .store("k", b"v".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert!(backend.get("k").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn take_is_at_most_once() {
        let backend = Arc::new(MemoryBackend::new());
        backend.store("once", b"v".to_vec(), None).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let backend = Arc::clone(&backend);
            tasks.push(tokio::spawn(async move { backend.take("once").await.unwrap() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn take_of_expired_entry_is_none() {
        let (backend, clock) = backend_with_clock();
        backend
            .store("k", b"v".to_vec(), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(5));
        assert_eq!(backend.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn removing_an_expired_entry_reports_nothing_removed() {
        let (backend, clock) = backend_with_clock();
        backend
            .store("k", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(!backend.remove("k").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let (backend, clock) = backend_with_clock();
        backend
            .store("short", b"a".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        backend.store("forever", b"b".to_vec(), None).await.unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_until_shutdown() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = MemoryBackend::new()
            .with_clock(clock.clone())
            .with_sweep_interval(Duration::from_secs(30));
        backend.startup().await.unwrap();
        backend
            .store("k", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(backend.is_empty());

        backend.shutdown().await.unwrap();
    }
}
