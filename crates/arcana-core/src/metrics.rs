//! Global atomic counters for Arcana observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on shutdown or a periodic tick).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters. No allocations, no locking.
pub struct Metrics {
    seeds_committed: AtomicU64,
    seeds_revealed: AtomicU64,
    entropy_failures: AtomicU64,
    draws_sampled: AtomicU64,
    provider_attempts: AtomicU64,
    billable_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_joins: AtomicU64,
    breaker_rejections: AtomicU64,
    degraded_readings: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub seeds_committed: u64,
    pub seeds_revealed: u64,
    pub entropy_failures: u64,
    pub draws_sampled: u64,
    pub provider_attempts: u64,
    pub billable_calls: u64,
    pub cache_hits: u64,
    pub cache_joins: u64,
    pub breaker_rejections: u64,
    pub degraded_readings: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            seeds_committed: AtomicU64::new(0),
            seeds_revealed: AtomicU64::new(0),
            entropy_failures: AtomicU64::new(0),
            draws_sampled: AtomicU64::new(0),
            provider_attempts: AtomicU64::new(0),
            billable_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_joins: AtomicU64::new(0),
            breaker_rejections: AtomicU64::new(0),
            degraded_readings: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_seeds_committed(&self) {
        Self::bump(&self.seeds_committed, "seeds_committed");
    }

    pub fn inc_seeds_revealed(&self) {
        Self::bump(&self.seeds_revealed, "seeds_revealed");
    }

    pub fn inc_entropy_failures(&self) {
        Self::bump(&self.entropy_failures, "entropy_failures");
    }

    pub fn inc_draws_sampled(&self) {
        Self::bump(&self.draws_sampled, "draws_sampled");
    }

    /// Every provider attempt, including retries and timeouts.
    pub fn inc_provider_attempts(&self) {
        Self::bump(&self.provider_attempts, "provider_attempts");
    }

    /// Successful provider completions.
    pub fn inc_billable_calls(&self) {
        Self::bump(&self.billable_calls, "billable_calls");
    }

    pub fn inc_cache_hits(&self) {
        Self::bump(&self.cache_hits, "cache_hits");
    }

    /// A caller joined an in-flight interpretation instead of starting one.
    pub fn inc_cache_joins(&self) {
        Self::bump(&self.cache_joins, "cache_joins");
    }

    pub fn inc_breaker_rejections(&self) {
        Self::bump(&self.breaker_rejections, "breaker_rejections");
    }

    pub fn inc_degraded_readings(&self) {
        Self::bump(&self.degraded_readings, "degraded_readings");
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            seeds_committed: self.seeds_committed.load(Ordering::Relaxed),
            seeds_revealed: self.seeds_revealed.load(Ordering::Relaxed),
            entropy_failures: self.entropy_failures.load(Ordering::Relaxed),
            draws_sampled: self.draws_sampled.load(Ordering::Relaxed),
            provider_attempts: self.provider_attempts.load(Ordering::Relaxed),
            billable_calls: self.billable_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_joins: self.cache_joins.load(Ordering::Relaxed),
            breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
            degraded_readings: self.degraded_readings.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (shutdown, periodic tick, end of a
    /// CLI command) rather than on every increment.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            seeds_committed = s.seeds_committed,
            seeds_revealed = s.seeds_revealed,
            entropy_failures = s.entropy_failures,
            draws_sampled = s.draws_sampled,
            provider_attempts = s.provider_attempts,
            billable_calls = s.billable_calls,
            cache_hits = s.cache_hits,
            cache_joins = s.cache_joins,
            breaker_rejections = s.breaker_rejections,
            degraded_readings = s.degraded_readings,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.seeds_committed,
            &self.seeds_revealed,
            &self.entropy_failures,
            &self.draws_sampled,
            &self.provider_attempts,
            &self.billable_calls,
            &self.cache_hits,
            &self.cache_joins,
            &self.breaker_rejections,
            &self.degraded_readings,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
