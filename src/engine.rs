//! The admission engine.
//!
//! `AdmissionEngine` is the single decision path: it validates the key, looks
//! up the effective quota, consults the active window store with the selected
//! algorithm, and tallies the outcome. It holds exactly one store instance
//! and never branches on backend identity; backend dispatch lives in
//! [`StoreKind`](crate::store::StoreKind).

use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::decision::{Decision, DenyReason, LimitStatus};
use crate::error::Result;
use crate::metrics::DecisionCounters;
use crate::registry::LimitRegistry;
use crate::store::WindowStore;

#[cfg(feature = "memory")]
use crate::store::{MemoryWindowStore, StoreKind};

/// Admission algorithm, fixed at engine construction.
///
/// A closed set: adding an algorithm means adding a variant here and its
/// store-side method, not modifying the existing ones. There is no runtime
/// switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Sliding-window counting: up to `limit` admissions per rolling window.
    #[default]
    TokenBucket,
    /// Minimum-interval spacing: one admission per `window / limit`.
    LeakyBucket,
}

impl Algorithm {
    /// Get the algorithm name (for logging/metrics).
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::LeakyBucket => "leaky_bucket",
        }
    }
}

/// Rate limiting admission engine over a pluggable window store.
///
/// The engine never panics on a bad request: every failure mode surfaces as a
/// deny [`Decision`] with a reason. Dropping an in-flight `acquire` future
/// aborts the backend I/O; no decision completes after cancellation.
pub struct AdmissionEngine<S> {
    store: S,
    registry: LimitRegistry,
    counters: Arc<DecisionCounters>,
    window: std::time::Duration,
    algorithm: Algorithm,
}

impl<S> std::fmt::Debug for AdmissionEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionEngine")
            .field("window", &self.window)
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

#[cfg(feature = "memory")]
impl AdmissionEngine<StoreKind> {
    /// Create an engine on the process-local store.
    ///
    /// Any `redis_url` in the configuration is ignored; use
    /// [`connect`](Self::connect) for the shared backend.
    pub fn new(config: EngineConfig, algorithm: Algorithm) -> Self {
        Self::with_store(StoreKind::Memory(MemoryWindowStore::new()), config, algorithm)
    }

    /// Create an engine, attempting the shared backend first.
    ///
    /// If the configuration names a Redis URL and the backend is reachable,
    /// decisions run against it. Otherwise the engine logs the downgrade and
    /// permanently falls back to the process-local store; there is no
    /// reconnect loop for the remainder of the process lifetime.
    #[cfg(feature = "redis")]
    pub async fn connect(config: EngineConfig, algorithm: Algorithm) -> Self {
        use crate::store::{RedisConfig, RedisWindowStore};

        let store = match &config.redis_url {
            Some(url) => match RedisWindowStore::connect(RedisConfig::new(url.clone())).await {
                Ok(store) => {
                    tracing::info!(%url, "connected to Redis backend");
                    StoreKind::Redis(store)
                }
                Err(err) => {
                    tracing::warn!(
                        %url,
                        error = %err,
                        "Redis not available, falling back to in-memory storage"
                    );
                    StoreKind::Memory(MemoryWindowStore::new())
                }
            },
            None => StoreKind::Memory(MemoryWindowStore::new()),
        };

        Self::with_store(store, config, algorithm)
    }
}

impl<S: WindowStore> AdmissionEngine<S> {
    /// Create an engine over an explicit store instance.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails [`EngineConfig::validate`], e.g. a
    /// zero window.
    pub fn with_store(store: S, config: EngineConfig, algorithm: Algorithm) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid engine config: {err}");
        }
        Self {
            store,
            registry: LimitRegistry::new(config.default_limit),
            counters: Arc::new(DecisionCounters::new()),
            window: config.window,
            algorithm,
        }
    }

    /// Decide whether the caller identified by `key` may perform an action.
    ///
    /// An empty key is denied with `missing-key` before any store access.
    /// Backend faults deny with `backend-error`; the engine fails closed and
    /// never silently switches backend mid-request. Counters are updated on
    /// every call.
    pub async fn acquire(&self, key: &str) -> Decision {
        let _inflight = self.counters.begin_request();

        if key.is_empty() {
            self.counters.record_failure();
            return Decision::denied(DenyReason::MissingKey);
        }

        let limit = self.registry.limit_for(key);
        let started = Instant::now();
        let admitted = match self.algorithm {
            Algorithm::TokenBucket => self.store.admit_counting(key, limit, self.window).await,
            Algorithm::LeakyBucket => self.store.admit_spacing(key, limit, self.window).await,
        };
        self.counters.observe_backend_latency(started.elapsed());

        match admitted {
            Ok(true) => {
                self.counters.record_success();
                Decision::allowed()
            }
            Ok(false) => {
                tracing::debug!(%key, limit, algorithm = self.algorithm.name(), "denied");
                self.counters.record_failure();
                Decision::denied(DenyReason::RateLimitExceeded)
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "backend failure, failing closed");
                self.counters.record_failure();
                Decision::denied(DenyReason::BackendError)
            }
        }
    }

    /// Read-only snapshot of a key's current limit state.
    ///
    /// Does not consume quota. Pruning of expired entries on read is accepted
    /// as non-mutating. Backend faults propagate as errors; status is not a
    /// decision and does not fail closed.
    pub async fn status(&self, key: &str) -> Result<LimitStatus> {
        let limit = self.registry.limit_for(key);
        let count = self.store.occupancy(key, self.window).await?;

        Ok(LimitStatus {
            key: key.to_string(),
            tokens_left: limit.saturating_sub(count),
            limit,
            window_sec: self.window.as_secs(),
            refill_rate: limit as f64 / self.window.as_secs_f64(),
            source: self.store.source(),
        })
    }

    /// Set or overwrite the quota for a key.
    pub fn set_limit(&self, key: impl Into<String>, limit: u64) {
        self.registry.set_limit(key, limit);
    }

    /// Get the effective quota for a key.
    pub fn limit_for(&self, key: &str) -> u64 {
        self.registry.limit_for(key)
    }

    /// The process-wide decision counters, shared read-only with
    /// observability adapters.
    pub fn counters(&self) -> Arc<DecisionCounters> {
        self.counters.clone()
    }

    /// Render the decision counters in Prometheus text exposition format.
    pub fn metrics(&self) -> String {
        self.counters.render()
    }

    /// The configured rolling window.
    pub fn window(&self) -> std::time::Duration {
        self.window
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}
