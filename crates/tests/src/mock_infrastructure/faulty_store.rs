//! Fault-Injecting Store
//!
//! Delegates to an in-memory store unless a configured fault matches the operation and
//! key prefix. Faults either fail the call with [`StoreError::Unavailable`] or delay it,
//! which lets tests drive each admission stage into an outage or past its deadline.

use admit_core::store::{KeyValueStore, MemoryStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};

/// Store operation a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
    IncrBelow,
    Expire,
    Ttl,
    Delete,
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with [`StoreError::Unavailable`].
    Fail,
    /// Sleep before delegating.
    Delay(Duration),
}

#[derive(Debug, Clone)]
struct FaultRule {
    op: StoreOp,
    key_prefix: String,
    fault: Fault,
}

/// [`KeyValueStore`] wrapper with injectable faults and per-operation call counts.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    rules: Vec<FaultRule>,
    calls: Arc<DashMap<StoreOp, usize>>,
}

impl FaultyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails `op` for every logical key starting with `key_prefix`. An empty prefix
    /// matches every key.
    #[must_use]
    pub fn fail(self, op: StoreOp, key_prefix: &str) -> Self {
        self.with_fault(op, key_prefix, Fault::Fail)
    }

    /// Delays `op` by `delay` for every logical key starting with `key_prefix`.
    #[must_use]
    pub fn delay(self, op: StoreOp, key_prefix: &str, delay: Duration) -> Self {
        self.with_fault(op, key_prefix, Fault::Delay(delay))
    }

    #[must_use]
    pub fn with_fault(mut self, op: StoreOp, key_prefix: &str, fault: Fault) -> Self {
        self.rules.push(FaultRule { op, key_prefix: key_prefix.to_string(), fault });
        self
    }

    /// The wrapped store, for seeding and inspecting state without triggering faults.
    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Number of times `op` was called, faulted or not.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.get(&op).map_or(0, |count| *count)
    }

    async fn inject(&self, op: StoreOp, key: &str) -> Result<(), StoreError> {
        *self.calls.entry(op).or_insert(0) += 1;

        for rule in self.rules.iter().filter(|r| r.op == op && key.starts_with(&r.key_prefix)) {
            match rule.fault {
                Fault::Fail => {
                    return Err(StoreError::Unavailable(format!("injected {op:?} failure on '{key}'")))
                }
                Fault::Delay(delay) => tokio::time::sleep(delay).await,
            }
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inject(StoreOp::Get, key).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.inject(StoreOp::Set, key).await?;
        self.inner.set(key, value, ttl).await
    }

    async fn incr_below(&self, key: &str, limit: u64) -> Result<Option<i64>, StoreError> {
        self.inject(StoreOp::IncrBelow, key).await?;
        self.inner.incr_below(key, limit).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inject(StoreOp::Expire, key).await?;
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.inject(StoreOp::Ttl, key).await?;
        self.inner.ttl(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inject(StoreOp::Delete, key).await?;
        self.inner.delete(key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inject(StoreOp::Ping, "").await?;
        self.inner.ping().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fault_matches_prefix_only() {
        let store = FaultyStore::new().fail(StoreOp::Get, "xtoken_");
        store.inner().set("other", "v", None).await.unwrap();

        assert!(store.get("xtoken_u1").await.is_err());
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.calls(StoreOp::Get), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_then_delegate() {
        let store = FaultyStore::new().delay(StoreOp::Set, "", Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        store.set("k", "v", None).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(store.inner().get("k").await.unwrap().as_deref(), Some("v"));
    }
}
