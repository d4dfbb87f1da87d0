//! Decision types for admission results.
//!
//! Every call to [`AdmissionEngine::acquire`](crate::engine::AdmissionEngine::acquire)
//! produces exactly one `Decision`: allowed, or denied with a machine-readable
//! reason. Decisions are wire-facing and serialize to the shape transport
//! adapters hand to callers: `{"allowed": true}` or
//! `{"allowed": false, "error": "rate-limit-exceeded"}`.

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// The caller supplied no key (or an empty one). No backend was consulted.
    MissingKey,
    /// The quota for the key is exhausted within the current window.
    RateLimitExceeded,
    /// The shared backend failed mid-decision; the request fails closed.
    BackendError,
    /// Defensive catch-all for an unrecognized algorithm selector.
    UnknownAlgorithm,
}

impl DenyReason {
    /// Stable wire string for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingKey => "missing-key",
            Self::RateLimitExceeded => "rate-limit-exceeded",
            Self::BackendError => "backend-error",
            Self::UnknownAlgorithm => "unknown-algorithm",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is allowed.
    allowed: bool,
    /// Deny reason, present only when `allowed` is false.
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

impl Decision {
    /// Create a new "allowed" decision.
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Create a new "denied" decision with the given reason.
    pub fn denied(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Get the deny reason, if any.
    pub fn reason(&self) -> Option<DenyReason> {
        self.reason
    }
}

/// Read-only snapshot of a key's rate limit state.
///
/// Produced by [`AdmissionEngine::status`](crate::engine::AdmissionEngine::status).
/// `refill_rate` is informational only and plays no part in admission logic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitStatus {
    /// The key this status describes.
    pub key: String,
    /// Admissions still available in the current window.
    pub tokens_left: u64,
    /// Configured quota for the key.
    pub limit: u64,
    /// Window length in seconds.
    pub window_sec: u64,
    /// Quota per second, `limit / window_sec`.
    pub refill_rate: f64,
    /// Which backend answered; `Some("redis")` for the shared store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}
