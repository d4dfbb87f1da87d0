//! Process-local window store.
//!
//! Call histories live in a `DashMap` keyed by caller key. The map's `entry`
//! API holds the shard write lock for the duration of each prune-then-append,
//! so the read-modify-write on a single key is strictly serialized: two
//! concurrent callers can never both observe `count < limit` and both append.

use std::time::Duration;

use dashmap::DashMap;

use crate::error::StorageError;
use crate::store::{current_timestamp_ms, WindowStore};

/// In-memory window store backed by a concurrent map.
///
/// Histories are ordered sequences of admitted-call timestamps in Unix
/// milliseconds, pruned lazily on every access. State is per process and not
/// shared across instances.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    calls: DashMap<String, Vec<u64>>,
}

impl MemoryWindowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drop all histories.
    pub fn clear(&self) {
        self.calls.clear();
    }
}

/// Drop timestamps that have left the window.
fn prune(history: &mut Vec<u64>, now: u64, window_ms: u64) {
    history.retain(|&ts| now.saturating_sub(ts) < window_ms);
}

impl WindowStore for MemoryWindowStore {
    fn source(&self) -> Option<&'static str> {
        None
    }

    async fn admit_counting(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        let now = current_timestamp_ms();
        let window_ms = window.as_millis() as u64;

        let mut entry = self.calls.entry(key.to_string()).or_default();
        let history = entry.value_mut();
        prune(history, now, window_ms);

        if history.len() as u64 >= limit {
            // The rejected attempt is not recorded
            return Ok(false);
        }
        history.push(now);
        Ok(true)
    }

    async fn admit_spacing(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StorageError> {
        // Always-deny instead of dividing the window by zero
        if limit == 0 {
            return Ok(false);
        }

        let now = current_timestamp_ms();
        let window_ms = window.as_millis() as u64;
        let interval_ms = window_ms / limit;

        let mut entry = self.calls.entry(key.to_string()).or_default();
        let history = entry.value_mut();
        prune(history, now, window_ms);

        if let Some(&last) = history.last() {
            if now.saturating_sub(last) < interval_ms {
                return Ok(false);
            }
        }
        history.push(now);
        Ok(true)
    }

    async fn occupancy(&self, key: &str, window: Duration) -> Result<u64, StorageError> {
        let now = current_timestamp_ms();
        let window_ms = window.as_millis() as u64;

        let count = match self.calls.get_mut(key) {
            Some(mut entry) => {
                prune(entry.value_mut(), now, window_ms);
                entry.len() as u64
            }
            None => 0,
        };

        if count == 0 {
            // Fully-expired keys self-clean here, mirroring the shared
            // backend's TTL behavior
            self.calls.remove_if(key, |_, history| history.is_empty());
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_within_limit() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_secs(60);

        for i in 1..=3 {
            let admitted = store.admit_counting("user:1", 3, window).await.unwrap();
            assert!(admitted, "call {} should be admitted", i);
        }
        let admitted = store.admit_counting("user:1", 3, window).await.unwrap();
        assert!(!admitted);
        assert_eq!(store.occupancy("user:1", window).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counting_denial_not_recorded() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_secs(60);

        assert!(store.admit_counting("user:1", 1, window).await.unwrap());
        for _ in 0..5 {
            assert!(!store.admit_counting("user:1", 1, window).await.unwrap());
        }
        assert_eq!(store.occupancy("user:1", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counting_window_slides() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_millis(100);

        assert!(store.admit_counting("user:1", 1, window).await.unwrap());
        assert!(!store.admit_counting("user:1", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.admit_counting("user:1", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_counting_zero_limit_denies() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_secs(60);
        assert!(!store.admit_counting("blocked", 0, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_spacing_enforces_interval() {
        let store = MemoryWindowStore::new();
        // 2 per 200ms, so one call every 100ms
        let window = Duration::from_millis(200);

        assert!(store.admit_spacing("user:1", 2, window).await.unwrap());
        assert!(!store.admit_spacing("user:1", 2, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(store.admit_spacing("user:1", 2, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_spacing_zero_limit_denies() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_secs(60);
        assert!(!store.admit_spacing("blocked", 0, window).await.unwrap());
        assert_eq!(store.occupancy("blocked", window).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_independent() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_secs(60);

        assert!(store.admit_counting("user:1", 1, window).await.unwrap());
        assert!(!store.admit_counting("user:1", 1, window).await.unwrap());
        assert!(store.admit_counting("user:2", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_occupancy_prunes_and_self_cleans() {
        let store = MemoryWindowStore::new();
        let window = Duration::from_millis(50);

        assert!(store.admit_counting("user:1", 5, window).await.unwrap());
        assert_eq!(store.occupancy("user:1", window).await.unwrap(), 1);
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(store.occupancy("user:1", window).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admissions_exact() {
        use std::sync::Arc;

        let store = Arc::new(MemoryWindowStore::new());
        let window = Duration::from_secs(60);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.admit_counting("user:1", 5, window).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        // Per-key serialization makes the count exact, never over-admitted
        assert_eq!(admitted, 5);
    }
}
