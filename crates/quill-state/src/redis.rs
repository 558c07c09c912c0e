//! Redis storage backend.
//!
//! Shares state between any number of worker processes. TTLs are enforced by
//! the server (`SET … PX`) and `take` is `GETDEL`, so both are atomic across
//! processes. Keys are prefixed so `clear` only touches this application's
//! entries.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::info;

use crate::backend::StorageBackend;
use crate::error::{StateError, StateResult};

const BACKEND: &str = "redis";

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "quill:";

/// State kept in Redis.
pub struct RedisBackend {
    client: redis::Client,
    prefix: String,
    conn: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    /// Creates a backend for the server at `url`. The connection is made in
    /// [`startup`](StorageBackend::startup).
    pub fn new(url: &str) -> StateResult<Self> {
        let client = redis::Client::open(url).map_err(|e| StateError::backend(BACKEND, e))?;
        Ok(Self {
            client,
            prefix: DEFAULT_KEY_PREFIX.to_owned(),
            conn: OnceCell::new(),
        })
    }

    /// Prefixes every key with `prefix`.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn connection(&self) -> StateResult<ConnectionManager> {
        self.conn.get().cloned().ok_or(StateError::NotRunning(BACKEND))
    }
}

fn redis_err(e: redis::RedisError) -> StateError {
    StateError::backend(BACKEND, e)
}

#[async_trait]
impl StorageBackend for RedisBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn startup(&self) -> StateResult<()> {
        let client = self.client.clone();
        self.conn
            .get_or_try_init(|| async move { ConnectionManager::new(client).await })
            .await
            .map_err(redis_err)?;
        info!(prefix = %self.prefix, "Redis state backend connected");
        Ok(())
    }

    async fn store(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StateResult<()> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.key(key)).arg(value);
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn take(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        redis::cmd("GETDEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn remove(&self, key: &str) -> StateResult<bool> {
        let mut conn = self.connection()?;
        let removed: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> StateResult<()> {
        let mut conn = self.connection()?;
        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(redis_err)?;
            if !keys.is_empty() {
                let _: i64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(redis_err)?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        let backend = RedisBackend::new("redis://127.0.0.1/")
            .unwrap()
            .with_key_prefix("bot-a:");
        assert_eq!(backend.key("command-state:x"), "bot-a:command-state:x");
    }

    #[tokio::test]
    async fn operations_before_startup_fail() {
        let backend = RedisBackend::new("redis://127.0.0.1/").unwrap();
        assert!(matches!(
            backend.get("k").await,
            Err(StateError::NotRunning("redis"))
        ));
    }
}
