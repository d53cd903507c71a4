//! Execution controls for provider calls: per-attempt timeout, retry with
//! capped exponential backoff, circuit breaker.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::provider::ProviderError;
use crate::backoff::BackoffPolicy;
use crate::metrics::METRICS;
use crate::obs;

/// Configuration for provider call execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub timeout_ms: u64,
    /// Attempts per call, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Consecutive failures that open the breaker.
    pub breaker_threshold: u32,
    /// Time an open breaker waits before letting a trial call through (milliseconds).
    pub breaker_cooldown_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            breaker_threshold: 5,
            breaker_cooldown_ms: 30_000,
        }
    }
}

/// Circuit breaker that opens after N consecutive failures and half-opens
/// after a cool-down.
///
/// While open, calls are rejected. Once the cool-down has passed a single
/// trial call is admitted per cool-down window; success closes the breaker,
/// failure restarts the window.
#[derive(Debug)]
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    threshold: u32,
    cooldown: Duration,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            threshold: threshold.max(1),
            cooldown,
            opened_at: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.breaker_threshold,
            Duration::from_millis(config.breaker_cooldown_ms),
        )
    }

    /// Returns `true` if the failure count has reached the threshold.
    pub fn is_open(&self) -> bool {
        self.failure_count() >= self.threshold
    }

    /// Whether a call may proceed now. Claims the half-open trial slot when
    /// the cool-down has elapsed.
    pub fn try_acquire(&self) -> bool {
        if !self.is_open() {
            return true;
        }
        let mut opened_at = self.opened_at.lock().unwrap();
        match *opened_at {
            Some(at) if at.elapsed() >= self.cooldown => {
                *opened_at = Some(Instant::now());
                true
            }
            Some(_) => false,
            None => {
                *opened_at = Some(Instant::now());
                false
            }
        }
    }

    /// Record a failure. Returns current consecutive failure count.
    pub fn record_failure(&self) -> u32 {
        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.threshold {
            *self.opened_at.lock().unwrap() = Some(Instant::now());
            if count == self.threshold {
                obs::emit_breaker_opened(count);
            }
        }
        count
    }

    /// Reset on success.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.opened_at.lock().unwrap() = None;
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// A successful call and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why a call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("circuit breaker open after {consecutive_failures} consecutive failures")]
    BreakerOpen {
        consecutive_failures: u32,
        attempts: u32,
    },

    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: ProviderError },

    #[error("permanent failure on attempt {attempts}: {error}")]
    Permanent { attempts: u32, error: ProviderError },

    #[error("provider pool is closed")]
    PoolClosed,
}

impl ExecutionError {
    /// Provider attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionError::BreakerOpen { attempts, .. }
            | ExecutionError::Exhausted { attempts, .. }
            | ExecutionError::Permanent { attempts, .. } => *attempts,
            ExecutionError::PoolClosed => 0,
        }
    }
}

/// Run `call` with timeout, retry and circuit-breaker controls.
///
/// `call` receives the per-attempt timeout and is invoked once per attempt.
/// The breaker is checked before each attempt and updated after. Permanent
/// errors are returned immediately and do not count against the breaker.
pub async fn execute_with_controls<T, F, Fut>(
    config: &ExecutionConfig,
    breaker: &CircuitBreaker,
    call: F,
) -> Result<Completion<T>, ExecutionError>
where
    F: Fn(Duration) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut last = ProviderError::Server("no attempt made".to_string());

    for attempt in 1..=max_attempts {
        if !breaker.try_acquire() {
            METRICS.inc_breaker_rejections();
            return Err(ExecutionError::BreakerOpen {
                consecutive_failures: breaker.failure_count(),
                attempts: attempt - 1,
            });
        }

        METRICS.inc_provider_attempts();
        let result = match tokio::time::timeout(timeout, call(timeout)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ProviderError::Timeout {
                limit_ms: config.timeout_ms,
            }),
        };

        match result {
            Ok(value) => {
                breaker.record_success();
                return Ok(Completion {
                    value,
                    attempts: attempt,
                });
            }
            Err(error) if !error.is_transient() => {
                return Err(ExecutionError::Permanent {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                breaker.record_failure();
                if attempt < max_attempts {
                    let delay = config.backoff.delay_for(attempt - 1);
                    obs::emit_provider_retry(attempt, delay.as_millis() as u64, &error);
                    tokio::time::sleep(delay).await;
                }
                last = error;
            }
        }
    }

    Err(ExecutionError::Exhausted {
        attempts: max_attempts,
        last,
    })
}
