//! # Quill State
//!
//! Cross-process managed state for Quill applications.
//!
//! Component interactions carry nothing but an opaque reference id; the
//! context a handler attached to a response lives in a shared key/value store
//! so any worker can service any click. This crate provides:
//!
//! - [`StorageBackend`]: the pluggable persistence contract (TTL, atomic take)
//! - [`MemoryBackend`]: single-process store with lazy and periodic eviction
//! - `SqliteBackend` (feature `sqlite`): embedded store on a single owner thread
//! - `RedisBackend` (feature `redis`): network store for multi-process deployments
//! - [`ManagedState`] / [`Namespace`]: JSON values partitioned by logical domain,
//!   every operation bounded by a timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_state::{ManagedState, MemoryBackend, COMMAND_STATE};
//!
//! let state = ManagedState::new(MemoryBackend::new());
//! state.startup().await?;
//!
//! let contexts = state.namespace(COMMAND_STATE);
//! contexts.set("3f2a…", &json!({"count": 1}), Some(Duration::from_secs(900))).await?;
//! let once: Option<Value> = contexts.take("3f2a…").await?;
//! ```

pub mod backend;
pub mod clock;
pub mod error;
pub mod managed;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{BoxedBackend, StorageBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StateResult};
pub use managed::{COMMAND_STATE, DEFAULT_OPERATION_TIMEOUT, ManagedState, Namespace};
pub use memory::MemoryBackend;

#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
