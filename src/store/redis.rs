//! Shared window store backed by Redis sorted sets.
//!
//! Each key maps to a sorted set of admitted-call entries scored by timestamp.
//! Every decision runs one atomic pipeline: prune, insert, count, refresh the
//! TTL. Atomicity is delegated entirely to the backend transaction; no
//! process-local locking is involved.

use std::time::Duration;

use deadpool_redis::{
    redis::{self, cmd},
    Config, Connection, Pool, PoolConfig, Runtime,
};
use uuid::Uuid;

use crate::error::StorageError;
use crate::store::{current_timestamp_ms, MemoryWindowStore, WindowStore};

/// Redis storage configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "ratelimit:".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Shared window store for multi-process deployments.
///
/// Minimum-interval admission is not defined over the shared backend; this
/// store delegates [`admit_spacing`](WindowStore::admit_spacing) to an
/// embedded [`MemoryWindowStore`], keeping the local semantics per process.
pub struct RedisWindowStore {
    pool: Pool,
    key_prefix: String,
    spacing: MemoryWindowStore,
}

impl std::fmt::Debug for RedisWindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWindowStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisWindowStore {
    /// Create a new Redis window store from configuration.
    ///
    /// Fails if the backend is unreachable; the caller decides whether to
    /// fall back to a local store.
    pub async fn connect(config: RedisConfig) -> Result<Self, StorageError> {
        let pool = build_pool(&config)?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let _: () = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
            spacing: MemoryWindowStore::new(),
        })
    }

    /// Create a new Redis window store from a URL.
    pub async fn from_url(url: impl Into<String>) -> Result<Self, StorageError> {
        Self::connect(RedisConfig::new(url)).await
    }

    /// Get the full key with prefix.
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> Result<Connection, StorageError> {
        self.pool.get().await.map_err(|_| StorageError::PoolExhausted)
    }

    /// Prune-then-count pipeline shared by occupancy and admission.
    fn prune_pipeline(full_key: &str, window_start: u64) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("ZREMRANGEBYSCORE")
            .arg(full_key)
            .arg(0)
            .arg(window_start)
            .ignore();
        pipe
    }
}

/// Build a connection pool honoring the configured size and timeouts.
///
/// Pool creation is lazy; no connection is made here.
fn build_pool(config: &RedisConfig) -> Result<Pool, StorageError> {
    let mut cfg = Config::from_url(&config.url);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(config.connection_timeout);
    pool_config.timeouts.create = Some(config.connection_timeout);
    cfg.pool = Some(pool_config);

    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| StorageError::ConnectionFailed(e.to_string()))
}

/// Build a sorted-set member for an admission at `now_ms`.
///
/// The timestamp alone would collide under sub-millisecond repeat calls, so
/// the member carries a random suffix while the score stays the timestamp.
fn window_member(now_ms: u64) -> String {
    format!("{}-{}", now_ms, Uuid::new_v4().simple())
}

impl WindowStore for RedisWindowStore {
    fn source(&self) -> Option<&'static str> {
        Some("redis")
    }

    async fn admit_counting(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        let now = current_timestamp_ms();
        let window_ms = window.as_millis() as u64;
        let window_start = now.saturating_sub(window_ms);
        let member = window_member(now);

        let mut pipe = Self::prune_pipeline(&full_key, window_start);
        pipe.cmd("ZADD").arg(&full_key).arg(now).arg(&member).ignore();
        pipe.cmd("ZCARD").arg(&full_key);
        pipe.cmd("EXPIRE")
            .arg(&full_key)
            .arg(window.as_secs().max(1))
            .ignore();

        let (count,): (u64,) = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::operation_failed(e.to_string(), true))?;

        if count > limit {
            // Retract the just-inserted member so the set stays exactly
            // capped at `limit`
            let _: () = cmd("ZREM")
                .arg(&full_key)
                .arg(&member)
                .query_async(&mut *conn)
                .await
                .map_err(|e| StorageError::operation_failed(e.to_string(), true))?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn admit_spacing(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        self.spacing.admit_spacing(key, limit, window).await
    }

    /// Counts the shared sorted set only. Spacing admissions are recorded in
    /// the embedded per-process store and do not appear here, so under the
    /// minimum-interval algorithm `tokens_left` reflects the shared counting
    /// state rather than spacing history.
    async fn occupancy(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        let now = current_timestamp_ms();
        let window_start = now.saturating_sub(window.as_millis() as u64);

        let mut pipe = Self::prune_pipeline(&full_key, window_start);
        pipe.cmd("ZCARD").arg(&full_key);

        let (count,): (u64,) = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::operation_failed(e.to_string(), true))?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config() {
        let config = RedisConfig::new("redis://localhost:6380")
            .with_prefix("test:")
            .with_pool_size(5);

        assert_eq!(config.url, "redis://localhost:6380");
        assert_eq!(config.key_prefix, "test:");
        assert_eq!(config.pool_size, 5);
    }

    #[tokio::test]
    async fn test_pool_honors_config() {
        let config = RedisConfig::new("redis://localhost:6379")
            .with_pool_size(3);

        // Lazy pool creation, no server needed
        let pool = build_pool(&config).unwrap();
        assert_eq!(pool.status().max_size, 3);
    }

    #[test]
    fn test_window_member_unique() {
        let a = window_member(1_700_000_000_000);
        let b = window_member(1_700_000_000_000);
        assert_ne!(a, b);
        assert!(a.starts_with("1700000000000-"));
    }
}
