//! Keyed admission control for Rust.
//!
//! `ratewarden` decides whether a caller identified by a key (user id or API
//! key) may perform an action, bounding the rate of allowed actions over a
//! rolling window:
//!
//! - **Two Algorithms**: sliding-window counting (token bucket) and
//!   minimum-interval spacing (leaky bucket)
//! - **Pluggable Storage**: process-local concurrent map, or shared Redis
//!   sorted sets for multi-process deployments
//! - **Per-Key Limits**: overrides on top of a global default quota
//! - **Observability**: process-wide decision counters with Prometheus text
//!   exposition
//!
//! Transport, authentication, and admin surfaces are external collaborators:
//! the engine receives an already-validated key string and returns a
//! serializable [`Decision`].
//!
//! # Quick Start
//!
//! ```ignore
//! use ratewarden::{AdmissionEngine, Algorithm, EngineConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EngineConfig::new(5, Duration::from_secs(60));
//!     let engine = AdmissionEngine::new(config, Algorithm::TokenBucket);
//!     engine.set_limit("user123", 20);
//!
//!     let decision = engine.acquire("user123").await;
//!     if decision.is_allowed() {
//!         println!("admitted");
//!     } else {
//!         println!("denied: {:?}", decision.reason());
//!     }
//! }
//! ```
//!
//! # Backends
//!
//! [`AdmissionEngine::connect`] (with the `redis` feature) tries the shared
//! backend named by the configuration and permanently falls back to the
//! local store when it is unreachable. Decisions fail closed on backend
//! errors; the engine never switches backend mid-request.
//!
//! # Feature Flags
//!
//! - `memory` (default): process-local window store
//! - `redis`: shared Redis window store

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod store;

// Re-export main types
pub use config::EngineConfig;
pub use decision::{Decision, DenyReason, LimitStatus};
pub use engine::{AdmissionEngine, Algorithm};
pub use error::{ConfigError, RateWardenError, Result, StorageError};
pub use metrics::DecisionCounters;
pub use registry::LimitRegistry;
pub use store::WindowStore;

// Re-export storage backends
#[cfg(feature = "memory")]
pub use store::{MemoryWindowStore, StoreKind};

#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisWindowStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::decision::{Decision, DenyReason, LimitStatus};
    pub use crate::engine::{AdmissionEngine, Algorithm};
    pub use crate::error::{RateWardenError, Result};
    pub use crate::store::WindowStore;

    #[cfg(feature = "memory")]
    pub use crate::store::MemoryWindowStore;

    #[cfg(feature = "redis")]
    pub use crate::store::{RedisConfig, RedisWindowStore};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_token_bucket() {
        use std::time::Duration;

        let config = EngineConfig::new(2, Duration::from_secs(60));
        let engine = AdmissionEngine::new(config, Algorithm::TokenBucket);

        assert!(engine.acquire("user:1").await.is_allowed());
        assert!(engine.acquire("user:1").await.is_allowed());

        let decision = engine.acquire("user:1").await;
        assert!(decision.is_denied());
        assert_eq!(decision.reason(), Some(DenyReason::RateLimitExceeded));

        // Other keys are unaffected
        assert!(engine.acquire("user:2").await.is_allowed());
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_wire_shapes() {
        use std::time::Duration;

        let config = EngineConfig::new(1, Duration::from_secs(60));
        let engine = AdmissionEngine::new(config, Algorithm::TokenBucket);

        let decision = engine.acquire("user:1").await;
        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            serde_json::json!({ "allowed": true })
        );

        let decision = engine.acquire("").await;
        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            serde_json::json!({ "allowed": false, "error": "missing-key" })
        );

        let status = engine.status("user:1").await.unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["tokens_left"], 0);
        assert_eq!(json["window_sec"], 60);
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_integration_metrics_exposition() {
        use std::time::Duration;

        let config = EngineConfig::new(1, Duration::from_secs(60));
        let engine = AdmissionEngine::new(config, Algorithm::TokenBucket);

        engine.acquire("user:1").await;
        engine.acquire("user:1").await;

        let text = engine.metrics();
        assert!(text.contains("ratelimiter_successful_acquires 1"));
        assert!(text.contains("ratelimiter_failed_acquires 1"));
    }
}
