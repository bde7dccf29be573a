//! Key-value store abstraction backing every stateful admission check.
//!
//! The admission pipeline owns no durable state. Credentials, subscription records,
//! resource labels, quota counters and tier markers all live in an external store that
//! offers get / set-with-expiry / atomic increment / set-expiry per key.
//!
//! # Backends
//!
//! - **[`RedisStore`]**: production backend over a multiplexed Redis connection. Every
//!   logical key is namespaced with a configurable prefix (default `star:`).
//! - **[`MemoryStore`]**: in-process, TTL-aware map for tests and local development.
//!
//! # Atomicity
//!
//! [`KeyValueStore::incr_below`] must be atomic per key. The quota tracker relies on this
//! so that concurrent requests for the same counter never lose an increment and never push
//! it past the rule's maximum.
//!
//! # Key Layout
//!
//! See [`keys`] for the logical key names. They match the layout used by existing
//! deployments so that records written by other services stay readable.

pub mod keys;
pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use crate::config::{StoreConfig, BACKEND_MEMORY};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by a [`KeyValueStore`] backend.
///
/// A missing key is never an error; lookups return `Ok(None)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value exists but cannot be interpreted (e.g. a non-integer counter)
    #[error("malformed value at '{key}': {reason}")]
    Malformed { key: String, reason: String },

    /// The caller's deadline elapsed before the store answered
    #[error("store operation timed out")]
    Timeout,
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Contract the admission components require from the backing store.
///
/// Keys passed in are logical keys; backends apply their own namespace prefix.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the string value at `key`, or `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` at `key`. `Some(ttl)` arms an expiry; `None` stores without
    /// expiry and clears any previous one.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Atomically increments the integer at `key` unless it already holds `limit` or more.
    ///
    /// Returns the new value, or `None` when the limit was reached and nothing changed.
    /// A missing key counts as `0`. An existing expiry is left untouched.
    async fn incr_below(&self, key: &str, limit: u64) -> Result<Option<i64>, StoreError>;

    /// Arms an expiry on an existing key. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining time-to-live of `key`. `None` if the key is missing or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Deletes `key`. Returns `true` if a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Round-trip health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// How often the in-memory backend evicts expired keys.
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Opens the backend selected by `config.backend`.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if the redis backend cannot be reached.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    if config.backend == BACKEND_MEMORY {
        warn!("using in-memory store, state is lost on restart");
        let store = MemoryStore::new();
        store.start_purge_task(MEMORY_PURGE_INTERVAL);
        return Ok(Arc::new(store));
    }

    let store = RedisStore::connect(&config.url, config.key_prefix.clone()).await?;
    info!(prefix = %config.key_prefix, "redis store connected");
    Ok(Arc::new(store))
}
