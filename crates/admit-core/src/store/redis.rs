use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, warn};

/// Default namespace prepended to every logical key.
pub const DEFAULT_KEY_PREFIX: &str = "star:";

/// Compare-and-increment run server-side so the read and the `INCR` cannot interleave
/// with another client. Replies `-1` when the counter already holds the limit.
const INCR_BELOW_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if current and tonumber(current) == nil then
    return redis.error_reply('ERR value is not an integer or out of range')
end
if tonumber(current or '0') >= tonumber(ARGV[1]) then
    return -1
end
return redis.call('INCR', KEYS[1])
";

/// Redis-backed [`KeyValueStore`].
///
/// Holds a [`ConnectionManager`], which multiplexes commands over one connection and
/// reconnects transparently. Cloning the manager per call is cheap.
pub struct RedisStore {
    connection_manager: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connects to `url` and verifies the connection with `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is invalid or the server does not answer.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!(error = %e, "invalid redis url");
            StoreError::Unavailable(format!("invalid redis url: {e}"))
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!(error = %e, "failed to create redis connection manager");
            StoreError::Unavailable(format!("failed to connect: {e}"))
        })?;

        let store = Self { connection_manager, prefix: prefix.into() };
        store.ping().await?;

        debug!(prefix = %store.prefix, "connected to redis");
        Ok(store)
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection_manager.clone();

        let value: Option<String> =
            redis::cmd("GET").arg(self.full_key(key)).query_async(&mut conn).await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.full_key(key)).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(Self::millis(ttl));
        }
        cmd.query_async::<()>(&mut conn).await?;

        Ok(())
    }

    async fn incr_below(&self, key: &str, limit: u64) -> Result<Option<i64>, StoreError> {
        let mut conn = self.connection_manager.clone();

        let next: i64 = redis::Script::new(INCR_BELOW_SCRIPT)
            .key(self.full_key(key))
            .arg(limit)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                if e.kind() == redis::ErrorKind::ResponseError {
                    StoreError::Malformed { key: key.to_string(), reason: e.to_string() }
                } else {
                    StoreError::from(e)
                }
            })?;

        Ok((next >= 0).then_some(next))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection_manager.clone();

        let applied: i64 = redis::cmd("PEXPIRE")
            .arg(self.full_key(key))
            .arg(Self::millis(ttl))
            .query_async(&mut conn)
            .await?;

        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection_manager.clone();

        // -2: missing key, -1: no expiry
        let remaining: i64 =
            redis::cmd("PTTL").arg(self.full_key(key)).query_async(&mut conn).await?;

        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection_manager.clone();

        let removed: i64 = redis::cmd("DEL").arg(self.full_key(key)).query_async(&mut conn).await?;

        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        Ok(())
    }
}
