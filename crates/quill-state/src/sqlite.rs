//! SQLite storage backend.
//!
//! A single owner thread holds the connection and executes commands received
//! over a channel, so every statement is serialized. `take` is a single
//! `DELETE … RETURNING`, which also stays atomic when several processes share
//! the database file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::backend::StorageBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{StateError, StateResult};

const BACKEND: &str = "sqlite";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS quill_state (
        key TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL,
        expires_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_quill_state_expires_at ON quill_state(expires_at);";

type Reply<T> = oneshot::Sender<StateResult<T>>;

enum Command {
    Store {
        key: String,
        value: Vec<u8>,
        expires_at: Option<u64>,
        reply: Reply<()>,
    },
    Get {
        key: String,
        now: u64,
        reply: Reply<Option<Vec<u8>>>,
    },
    Take {
        key: String,
        now: u64,
        reply: Reply<Option<Vec<u8>>>,
    },
    Remove {
        key: String,
        now: u64,
        reply: Reply<bool>,
    },
    Clear {
        reply: Reply<()>,
    },
    Sweep {
        now: u64,
        reply: Reply<usize>,
    },
}

struct Worker {
    tx: mpsc::UnboundedSender<Command>,
    thread: JoinHandle<()>,
}

/// State persisted in a SQLite database file.
pub struct SqliteBackend {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    worker: Mutex<Option<Worker>>,
}

impl SqliteBackend {
    /// Creates a backend for the database at `path`. Nothing is opened
    /// until [`startup`](StorageBackend::startup).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
            worker: Mutex::new(None),
        }
    }

    /// Uses `clock` to evaluate TTLs.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Deletes expired rows. Returns how many were deleted.
    pub async fn sweep(&self) -> StateResult<usize> {
        let now = self.clock.now_millis();
        self.request(|reply| Command::Sweep { now, reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> StateResult<T> {
        let (reply, rx) = oneshot::channel();
        {
            let worker = self.worker.lock();
            let worker = worker.as_ref().ok_or(StateError::NotRunning(BACKEND))?;
            worker
                .tx
                .send(make(reply))
                .map_err(|_| StateError::NotRunning(BACKEND))?;
        }
        rx.await.map_err(|_| StateError::NotRunning(BACKEND))?
    }
}

fn open(path: &Path) -> StateResult<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| StateError::backend(BACKEND, format!("failed to open database: {e}")))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| StateError::backend(BACKEND, format!("failed to set WAL mode: {e}")))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| StateError::backend(BACKEND, e))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| StateError::backend(BACKEND, format!("failed to create schema: {e}")))?;
    Ok(conn)
}

fn sql<T>(result: rusqlite::Result<T>) -> StateResult<T> {
    result.map_err(|e| StateError::backend(BACKEND, e))
}

fn to_sql_time(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}

fn is_live(expires_at: Option<i64>, now: u64) -> bool {
    expires_at.is_none_or(|at| at > to_sql_time(now))
}

fn run(conn: Connection, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Store {
                key,
                value,
                expires_at,
                reply,
            } => {
                let result = sql(conn.execute(
                    "INSERT INTO quill_state (key, value, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                    params![key, value, expires_at.map(to_sql_time)],
                ))
                .map(|_| ());
                let _ = reply.send(result);
            }
            Command::Get { key, now, reply } => {
                let result = sql(conn
                    .query_row(
                        "SELECT value FROM quill_state
                         WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                        params![key, to_sql_time(now)],
                        |row| row.get::<_, Vec<u8>>(0),
                    )
                    .optional());
                let _ = reply.send(result);
            }
            Command::Take { key, now, reply } => {
                let result = sql(conn
                    .query_row(
                        "DELETE FROM quill_state WHERE key = ?1 RETURNING value, expires_at",
                        params![key],
                        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<i64>>(1)?)),
                    )
                    .optional())
                .map(|row| {
                    row.filter(|(_, expires_at)| is_live(*expires_at, now))
                        .map(|(value, _)| value)
                });
                let _ = reply.send(result);
            }
            Command::Remove { key, now, reply } => {
                let result = sql(conn
                    .query_row(
                        "DELETE FROM quill_state WHERE key = ?1 RETURNING expires_at",
                        params![key],
                        |row| row.get::<_, Option<i64>>(0),
                    )
                    .optional())
                .map(|row| row.is_some_and(|expires_at| is_live(expires_at, now)));
                let _ = reply.send(result);
            }
            Command::Clear { reply } => {
                let result = sql(conn.execute("DELETE FROM quill_state", [])).map(|_| ());
                let _ = reply.send(result);
            }
            Command::Sweep { now, reply } => {
                let result = sql(conn.execute(
                    "DELETE FROM quill_state WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![to_sql_time(now)],
                ));
                let _ = reply.send(result);
            }
        }
    }
    debug!("SQLite state worker stopped");
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn startup(&self) -> StateResult<()> {
        if self.worker.lock().is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let path = self.path.clone();

        let thread = std::thread::Builder::new()
            .name("quill-sqlite".into())
            .spawn(move || match open(&path) {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    run(conn, rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| StateError::backend(BACKEND, format!("failed to spawn worker: {e}")))?;

        ready_rx
            .await
            .map_err(|_| StateError::backend(BACKEND, "worker exited during startup"))??;

        *self.worker.lock() = Some(Worker { tx, thread });
        info!(path = %self.path.display(), "SQLite state backend started");

        let swept = self.sweep().await?;
        if swept > 0 {
            debug!(swept, "Removed expired state rows");
        }
        Ok(())
    }

    async fn shutdown(&self) -> StateResult<()> {
        let Some(Worker { tx, thread }) = self.worker.lock().take() else {
            return Ok(());
        };
        drop(tx);
        tokio::task::spawn_blocking(move || {
            if thread.join().is_err() {
                error!("SQLite state worker panicked");
            }
        })
        .await
        .map_err(|e| StateError::backend(BACKEND, e))?;
        info!("SQLite state backend stopped");
        Ok(())
    }

    async fn store(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StateResult<()> {
        let key = key.to_owned();
        let expires_at = self.clock.expiry(ttl);
        self.request(|reply| Command::Store {
            key,
            value,
            expires_at,
            reply,
        })
        .await
    }

    async fn get(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let key = key.to_owned();
        let now = self.clock.now_millis();
        self.request(|reply| Command::Get { key, now, reply }).await
    }

    async fn take(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let key = key.to_owned();
        let now = self.clock.now_millis();
        self.request(|reply| Command::Take { key, now, reply }).await
    }

    async fn remove(&self, key: &str) -> StateResult<bool> {
        let key = key.to_owned();
        let now = self.clock.now_millis();
        self.request(|reply| Command::Remove { key, now, reply }).await
    }

    async fn clear(&self) -> StateResult<()> {
        self.request(|reply| Command::Clear { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    async fn started(dir: &tempfile::TempDir, clock: Arc<ManualClock>) -> SqliteBackend {
        let backend = SqliteBackend::new(dir.path().join("state.db")).with_clock(clock);
        backend.startup().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn operations_before_startup_fail() {
        let backend = SqliteBackend::new("unused.db");
        assert!(matches!(
            backend.get("k").await,
            Err(StateError::NotRunning("sqlite"))
        ));
    }

    #[tokio::test]
    async fn store_get_take_remove() {
        let dir = tempfile::tempdir().unwrap();
        let backend = started(&dir, Arc::new(ManualClock::new(0))).await;

        backend.store("a", b"1".to_vec(), None).await.unwrap();
        backend.store("a", b"2".to_vec(), None).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some(b"2".to_vec()));

        assert_eq!(backend.take("a").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.take("a").await.unwrap(), None);

        backend.store("b", b"3".to_vec(), None).await.unwrap();
        assert!(backend.remove("b").await.unwrap());
        assert!(!backend.remove("b").await.unwrap());

        backend.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn expired_rows_are_absent_and_swept() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = started(&dir, clock.clone()).await;

        backend
            .store("short", b"x".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        backend.store("long", b"y".to_vec(), None).await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(backend.get("short").await.unwrap(), None);
        assert_eq!(backend.take("short").await.unwrap(), None);

        backend
            .store("short2", b"x".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(backend.sweep().await.unwrap(), 1);
        assert_eq!(backend.get("long").await.unwrap(), Some(b"y".to_vec()));

        backend.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn removing_an_expired_row_reports_nothing_removed() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let backend = started(&dir, clock.clone()).await;

        backend
            .store("k", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(!backend.remove("k").await.unwrap());
        assert_eq!(backend.sweep().await.unwrap(), 0);

        backend.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));

        let backend = started(&dir, clock.clone()).await;
        backend.store("k", b"v".to_vec(), None).await.unwrap();
        backend.shutdown().await.unwrap();

        let backend = started(&dir, clock).await;
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
        backend.clear().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_take_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(started(&dir, Arc::new(ManualClock::new(0))).await);
        backend.store("once", b"v".to_vec(), None).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.take("once").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        backend.shutdown().await.unwrap();
    }
}
