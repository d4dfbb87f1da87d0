//! Process-wide decision counters and their Prometheus exposition.
//!
//! One [`DecisionCounters`] aggregate is owned by the engine and shared with
//! observability adapters read-only. Counters are monotonic for the process
//! lifetime and reset only on restart. The metric names emitted by
//! [`DecisionCounters::render`] are a contract with scrape consumers and must
//! remain stable.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// Two-bucket counter for "requests in the last second".
#[derive(Debug, Default)]
struct SecondBuckets {
    /// Epoch second the `current` bucket counts.
    second: u64,
    current: u64,
    previous: u64,
}

impl SecondBuckets {
    /// Shift buckets so `current` counts `now_sec`.
    fn advance(&mut self, now_sec: u64) {
        if now_sec == self.second {
            return;
        }
        if now_sec == self.second + 1 {
            self.previous = self.current;
        } else {
            self.previous = 0;
        }
        self.current = 0;
        self.second = now_sec;
    }

    fn record(&mut self, now_sec: u64) {
        self.advance(now_sec);
        self.current += 1;
    }

    fn rolling_count(&mut self, now_sec: u64) -> u64 {
        self.advance(now_sec);
        self.previous + self.current
    }
}

/// Process-wide tallies of admission decisions.
///
/// Successful and failed acquires are plain atomic counters with no per-key
/// breakdown. The in-flight gauge tracks decisions currently being evaluated;
/// backend latency records the duration of the most recent shared-store call.
#[derive(Debug, Default)]
pub struct DecisionCounters {
    successful: AtomicU64,
    failed: AtomicU64,
    backend_latency_micros: AtomicU64,
    inflight: AtomicU64,
    last_second: Mutex<SecondBuckets>,
}

impl DecisionCounters {
    /// Create a fresh set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allowed decision.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.last_second.lock().record(now_epoch_secs());
    }

    /// Record a denied or errored decision.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.last_second.lock().record(now_epoch_secs());
    }

    /// Record the duration of a shared-backend call.
    pub fn observe_backend_latency(&self, latency: Duration) {
        self.backend_latency_micros
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Mark a decision as in flight; the returned guard decrements on drop.
    pub fn begin_request(&self) -> InflightGuard<'_> {
        self.inflight.fetch_add(1, Ordering::Relaxed);
        InflightGuard { counters: self }
    }

    /// Total allowed decisions since process start.
    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    /// Total denied or errored decisions since process start.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Decisions observed in the last rolling second.
    pub fn requests_last_second(&self) -> u64 {
        self.last_second.lock().rolling_count(now_epoch_secs())
    }

    /// Duration of the most recent shared-backend call, in microseconds.
    pub fn backend_latency_micros(&self) -> u64 {
        self.backend_latency_micros.load(Ordering::Relaxed)
    }

    /// Decisions currently being evaluated.
    pub fn inflight(&self) -> u64 {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Render the counters in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(640);
        render_metric(
            &mut out,
            "ratelimiter_successful_acquires",
            "counter",
            "Number of successful acquire attempts",
            self.successful(),
        );
        render_metric(
            &mut out,
            "ratelimiter_failed_acquires",
            "counter",
            "Number of failed acquire attempts",
            self.failed(),
        );
        render_metric(
            &mut out,
            "ratelimiter_requests_last_second",
            "gauge",
            "Requests in the last second",
            self.requests_last_second(),
        );
        render_metric(
            &mut out,
            "ratelimiter_backend_latency_microseconds",
            "gauge",
            "Last shared-backend call latency in microseconds",
            self.backend_latency_micros(),
        );
        render_metric(
            &mut out,
            "ratelimiter_inflight_requests",
            "gauge",
            "Decisions currently being evaluated",
            self.inflight(),
        );
        out
    }
}

/// RAII guard for the in-flight gauge.
#[derive(Debug)]
pub struct InflightGuard<'a> {
    counters: &'a DecisionCounters,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.counters.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

fn render_metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    // write! to a String cannot fail
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

fn now_epoch_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
