//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so request handlers never contend on a lock.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use them for coordination or logic decisions.

use crate::services::router::SkillRequest;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Upstream latency bucket boundaries (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800
const BUCKET_BOUNDS: [u64; 10] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];
const NUM_BUCKETS: usize = 11;

/// Number of histogram buckets (exported for the exposition endpoint)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

/// Request kinds in exposition order
pub const REQUEST_KINDS: [&str; 7] =
    ["launch", "next_arrival", "two_arrivals", "help", "cancel", "session_ended", "unrecognized"];

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Position of the request's kind label in `REQUEST_KINDS`
fn kind_index(request: &SkillRequest) -> usize {
    let kind = request.kind();
    REQUEST_KINDS
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(REQUEST_KINDS.len() - 1)
}

/// Lock-free metrics collector
///
/// All counters are monotonic; `report()` takes a snapshot without resetting.
pub struct Metrics {
    /// Requests by routed kind, indexed as `REQUEST_KINDS`
    requests: [AtomicU64; REQUEST_KINDS.len()],
    /// Request bodies that were not a valid envelope
    rejected_total: AtomicU64,
    /// Unknown or missing bus/stop names
    clarifications_total: AtomicU64,
    /// Outbound arrival lookups attempted
    upstream_requests_total: AtomicU64,
    /// Lookups that failed (network, status, parse)
    upstream_failures_total: AtomicU64,
    /// Lookups that succeeded with no estimates
    upstream_empty_total: AtomicU64,
    upstream_latency_buckets: [AtomicU64; NUM_BUCKETS],
    upstream_latency_sum_ms: AtomicU64,
    upstream_latency_max_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests: std::array::from_fn(|_| AtomicU64::new(0)),
            rejected_total: AtomicU64::new(0),
            clarifications_total: AtomicU64::new(0),
            upstream_requests_total: AtomicU64::new(0),
            upstream_failures_total: AtomicU64::new(0),
            upstream_empty_total: AtomicU64::new(0),
            upstream_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            upstream_latency_sum_ms: AtomicU64::new(0),
            upstream_latency_max_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_request(&self, request: &SkillRequest) {
        self.requests[kind_index(request)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_clarification(&self) {
        self.clarifications_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed upstream lookup and its latency
    pub fn record_upstream(&self, latency_ms: u64) {
        self.upstream_requests_total.fetch_add(1, Ordering::Relaxed);
        self.upstream_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        self.upstream_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.upstream_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_upstream_failure(&self) {
        self.upstream_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_upstream_empty(&self) {
        self.upstream_empty_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn upstream_requests_total(&self) -> u64 {
        self.upstream_requests_total.load(Ordering::Relaxed)
    }

    /// Snapshot all counters
    pub fn report(&self) -> MetricsSummary {
        let mut requests_by_kind = [0u64; REQUEST_KINDS.len()];
        for (i, counter) in self.requests.iter().enumerate() {
            requests_by_kind[i] = counter.load(Ordering::Relaxed);
        }

        let upstream_latency_buckets = load_buckets(&self.upstream_latency_buckets);
        let upstream_count: u64 = upstream_latency_buckets.iter().sum();
        let upstream_latency_sum = self.upstream_latency_sum_ms.load(Ordering::Relaxed);
        let upstream_latency_avg_ms =
            if upstream_count > 0 { upstream_latency_sum / upstream_count } else { 0 };

        MetricsSummary {
            requests_total: requests_by_kind.iter().sum(),
            requests_by_kind,
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            clarifications_total: self.clarifications_total.load(Ordering::Relaxed),
            upstream_requests_total: self.upstream_requests_total.load(Ordering::Relaxed),
            upstream_failures_total: self.upstream_failures_total.load(Ordering::Relaxed),
            upstream_empty_total: self.upstream_empty_total.load(Ordering::Relaxed),
            upstream_latency_p50_ms: percentile_from_buckets(&upstream_latency_buckets, 0.50),
            upstream_latency_p99_ms: percentile_from_buckets(&upstream_latency_buckets, 0.99),
            upstream_latency_buckets,
            upstream_latency_sum_ms: upstream_latency_sum,
            upstream_latency_avg_ms,
            upstream_latency_max_ms: self.upstream_latency_max_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub requests_total: u64,
    pub requests_by_kind: [u64; REQUEST_KINDS.len()],
    pub rejected_total: u64,
    pub clarifications_total: u64,
    pub upstream_requests_total: u64,
    pub upstream_failures_total: u64,
    pub upstream_empty_total: u64,
    /// Bounds: ≤25, ≤50, ≤100, ... ≤12800, >12800 ms
    pub upstream_latency_buckets: [u64; NUM_BUCKETS],
    pub upstream_latency_sum_ms: u64,
    pub upstream_latency_avg_ms: u64,
    pub upstream_latency_max_ms: u64,
    pub upstream_latency_p50_ms: u64,
    pub upstream_latency_p99_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.requests_total,
            rejected_total = %self.rejected_total,
            clarifications = %self.clarifications_total,
            upstream_requests = %self.upstream_requests_total,
            upstream_failures = %self.upstream_failures_total,
            upstream_empty = %self.upstream_empty_total,
            upstream_avg_ms = %self.upstream_latency_avg_ms,
            upstream_p99_ms = %self.upstream_latency_p99_ms,
            "metrics"
        );
    }
}
