//! Per-key limit registry.
//!
//! Maps a key to its configured quota, falling back to a process-wide default
//! when no override exists. Limits are set programmatically; there is no
//! config file format for per-key quotas.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Thread-safe registry of per-key quota overrides.
///
/// A limit of `0` is accepted and produces a permanently-denying key; it is
/// deliberately not rejected at configuration time.
#[derive(Debug)]
pub struct LimitRegistry {
    default_limit: u64,
    overrides: RwLock<HashMap<String, u64>>,
}

impl LimitRegistry {
    /// Create a registry with the given global default limit.
    pub fn new(default_limit: u64) -> Self {
        Self {
            default_limit,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Set or overwrite the quota for a key.
    pub fn set_limit(&self, key: impl Into<String>, limit: u64) {
        self.overrides.write().insert(key.into(), limit);
    }

    /// Remove a key's override, restoring the global default.
    pub fn clear_limit(&self, key: &str) {
        self.overrides.write().remove(key);
    }

    /// Get the effective quota for a key.
    pub fn limit_for(&self, key: &str) -> u64 {
        self.overrides
            .read()
            .get(key)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// The global default limit.
    pub fn default_limit(&self) -> u64 {
        self.default_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        let registry = LimitRegistry::new(5);
        assert_eq!(registry.limit_for("user:1"), 5);
        assert_eq!(registry.default_limit(), 5);
    }

    #[test]
    fn test_override_and_clear() {
        let registry = LimitRegistry::new(5);
        registry.set_limit("user:1", 20);
        assert_eq!(registry.limit_for("user:1"), 20);
        assert_eq!(registry.limit_for("user:2"), 5);

        registry.set_limit("user:1", 7);
        assert_eq!(registry.limit_for("user:1"), 7);

        registry.clear_limit("user:1");
        assert_eq!(registry.limit_for("user:1"), 5);
    }

    #[test]
    fn test_zero_limit_accepted() {
        let registry = LimitRegistry::new(5);
        registry.set_limit("blocked", 0);
        assert_eq!(registry.limit_for("blocked"), 0);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let registry = Arc::new(LimitRegistry::new(5));
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    registry.set_limit(format!("user:{}", i), j);
                    let _ = registry.limit_for("user:0");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.limit_for("user:3"), 99);
    }
}
