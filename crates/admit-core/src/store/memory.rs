use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    sync::{atomic::{AtomicUsize, Ordering}, Arc},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

/// In-process [`KeyValueStore`] with per-key expiry.
///
/// Expiry uses [`tokio::time::Instant`], so tests running with a paused clock can advance
/// past a quota window deterministically. Read-modify-write operations run under the
/// map's shard lock, which makes [`KeyValueStore::incr_below`] atomic per key.
///
/// Expired entries are dropped lazily on access. Long-running processes should also call
/// [`MemoryStore::start_purge_task`] so keys that are never read again get evicted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, including ones that expired but were not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries)
    }

    /// Spawns a task that calls [`MemoryStore::purge_expired`] every `every`. The task ends
    /// once every handle to the store has been dropped.
    pub fn start_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;

            loop {
                interval.tick().await;

                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = purge(&entries);
                if removed > 0 {
                    debug!(removed, "purged expired entries");
                }
            }
        })
    }

    /// Increments under the entry's shard lock, leaving the value untouched and returning
    /// `None` once it has reached `limit`.
    fn increment(&self, key: &str, limit: i64) -> Result<Option<i64>, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry { value: "0".to_string(), expires_at: None });

        if entry.is_expired(now) {
            *entry = MemoryEntry { value: "0".to_string(), expires_at: None };
        }

        let current: i64 = entry.value.parse().map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: format!("value is not an integer: {e}"),
        })?;
        if current >= limit {
            return Ok(None);
        }

        let next = current.checked_add(1).ok_or_else(|| StoreError::Malformed {
            key: key.to_string(),
            reason: "increment would overflow".to_string(),
        })?;

        entry.value = next.to_string();
        Ok(Some(next))
    }

    fn live_entry(&self, key: &str) -> Option<MemoryEntry> {
        let now = Instant::now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;

        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }

        Some(entry)
    }
}

fn purge(entries: &DashMap<String, MemoryEntry>) -> usize {
    let now = Instant::now();
    let removed = AtomicUsize::new(0);
    entries.retain(|_, entry| {
        let keep = !entry.is_expired(now);
        if !keep {
            removed.fetch_add(1, Ordering::Relaxed);
        }
        keep
    });
    removed.into_inner()
}

/// Expiry instant for `ttl` from `now`. A TTL too large to represent never expires.
fn expiry(now: Instant, ttl: Duration) -> Option<Instant> {
    now.checked_add(ttl)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.and_then(|ttl| expiry(Instant::now(), ttl));
        self.entries.insert(key.to_string(), MemoryEntry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn incr_below(&self, key: &str, limit: u64) -> Result<Option<i64>, StoreError> {
        self.increment(key, i64::try_from(limit).unwrap_or(i64::MAX))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = expiry(now, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self
            .live_entry(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
