//! Window store trait and backend implementations.
//!
//! A window store owns the per-key call histories that admission decisions
//! are made against. Two backends implement the same contract: a
//! process-local concurrent map and a shared Redis sorted set, so the engine
//! is agnostic to deployment topology.

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryWindowStore;

#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisWindowStore};

use std::future::Future;
use std::time::Duration;

use crate::error::StorageError;

/// Storage backend trait for keyed admission windows.
///
/// All operations are async to support both local and distributed backends.
/// Implementations must be thread-safe (`Send + Sync`) and must serialize
/// the read-modify-write for a single key: two concurrent admissions on the
/// same key must observe a consistent history.
///
/// Expired entries are pruned lazily on every access; no operation records
/// a denied attempt.
pub trait WindowStore: Send + Sync + 'static {
    /// Backend tag for status responses; `Some("redis")` for the shared
    /// store, `None` for the process-local one.
    fn source(&self) -> Option<&'static str>;

    /// Sliding-window-count admission.
    ///
    /// Prunes entries older than `window`, then admits and records the call
    /// if fewer than `limit` entries remain. Returns `true` when admitted.
    /// A `limit` of zero denies every call.
    fn admit_counting(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Minimum-interval admission.
    ///
    /// Admits only if at least `window / limit` has elapsed since the most
    /// recent admitted call for `key`. A `limit` of zero denies every call
    /// rather than dividing by it.
    fn admit_spacing(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Number of retained entries for `key`.
    ///
    /// Prunes expired entries as a side effect, which is accepted as
    /// non-mutating: only already-invalid entries are removed.
    fn occupancy(
        &self,
        key: &str,
        window: Duration,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;
}

impl<S: WindowStore + ?Sized> WindowStore for std::sync::Arc<S> {
    fn source(&self) -> Option<&'static str> {
        (**self).source()
    }

    async fn admit_counting(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        (**self).admit_counting(key, limit, window).await
    }

    async fn admit_spacing(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        (**self).admit_spacing(key, limit, window).await
    }

    async fn occupancy(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        (**self).occupancy(key, window).await
    }
}

/// Runtime-selected backend, chosen once at engine construction.
///
/// The engine never inspects which variant it holds; dispatch lives here so
/// backend identity stays inside the store layer.
#[cfg(feature = "memory")]
#[derive(Debug)]
pub enum StoreKind {
    /// Process-local concurrent map.
    Memory(MemoryWindowStore),
    /// Shared Redis sorted sets.
    #[cfg(feature = "redis")]
    Redis(RedisWindowStore),
}

#[cfg(feature = "memory")]
impl WindowStore for StoreKind {
    fn source(&self) -> Option<&'static str> {
        match self {
            Self::Memory(store) => store.source(),
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.source(),
        }
    }

    async fn admit_counting(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        match self {
            Self::Memory(store) => store.admit_counting(key, limit, window).await,
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.admit_counting(key, limit, window).await,
        }
    }

    async fn admit_spacing(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        match self {
            Self::Memory(store) => store.admit_spacing(key, limit, window).await,
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.admit_spacing(key, limit, window).await,
        }
    }

    async fn occupancy(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        match self {
            Self::Memory(store) => store.occupancy(key, window).await,
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.occupancy(key, window).await,
        }
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub(crate) fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
