//! Backoff policy: per-task retry delays.

use std::time::Duration;

use crate::error::{CourierError, Result};

/// Exponential backoff for failed task executions.
///
/// `delay(k) = min(unit * base^k, max_delay)` where `k` is the task's
/// `attempt_count` after the failed attempt. With the defaults (base 2, unit
/// 1s, ceiling 60s):
/// - attempt 1: 2s
/// - attempt 2: 4s
/// - attempt 3: 8s
/// - attempt 6 and later: 60s
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: f64,
    unit: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: 2.0,
            unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// `base` must be finite and `>= 1` so delays never shrink; `unit` must be
    /// non-zero so every retry lands strictly later than the failed attempt.
    pub fn new(base: f64, unit: Duration, max_delay: Duration) -> Result<Self> {
        if !base.is_finite() || base < 1.0 {
            return Err(CourierError::configuration(format!(
                "backoff base must be a finite number >= 1, got {base}"
            )));
        }
        if unit.is_zero() {
            return Err(CourierError::configuration("backoff unit must be non-zero"));
        }
        if max_delay < unit {
            return Err(CourierError::configuration(format!(
                "backoff max delay {max_delay:?} is shorter than the unit {unit:?}"
            )));
        }
        Ok(Self {
            base,
            unit,
            max_delay,
        })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn delay(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.min(i32::MAX as u32) as i32;
        let nanos = self.unit.as_nanos() as f64 * self.base.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }
}
