//! Capped exponential backoff with down-jitter.
//!
//! Shared by the entropy source (chain reads) and the interpretation
//! execution controls (provider calls).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff schedule: `initial * 2^step`, capped at `max`, then scaled by a
/// random factor in `[1 - jitter_factor, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds).
    pub max_delay_ms: u64,
    /// Down-jitter factor (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter_factor: 0.25,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `step + 1` without jitter applied.
    pub fn ceiling_for(&self, step: u32) -> Duration {
        let factor = 2u64.saturating_pow(step.min(32));
        let base = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(base.min(self.max_delay_ms))
    }

    /// Jittered delay before retry number `step + 1`. A jitter factor that
    /// is not a finite number counts as zero.
    pub fn delay_for(&self, step: u32) -> Duration {
        let ceiling = self.ceiling_for(step);
        let jitter = if self.jitter_factor.is_finite() {
            self.jitter_factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let scale = 1.0 - rand::random::<f64>() * jitter;
        ceiling.mul_f64(scale)
    }
}
