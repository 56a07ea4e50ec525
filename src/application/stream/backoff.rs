use std::num::NonZeroU32;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Fractional spread applied to every delay, `0.2` meaning ±20 %.
    pub jitter: f64,
    /// Consecutive failed connection attempts tolerated before giving up.
    pub max_retries: NonZeroU32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: 0.2,
            max_retries: NonZeroU32::MIN.saturating_add(9),
        }
    }
}

/// Exponential reconnect delays. The base may be replaced by a server
/// `retry:` hint; the cap always applies.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    base: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            base: policy.initial,
            policy,
            failures: 0,
        }
    }

    /// Count one failed attempt and return how long to wait before the next,
    /// or `None` once `max_retries` consecutive failures have piled up.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.policy.max_retries.get() {
            return None;
        }
        let factor = 1u32.checked_shl(self.failures - 1).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.policy.max);
        Some(self.jittered(delay))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let spread = self.policy.jitter;
        if spread.is_nan() || spread <= 0.0 {
            return delay;
        }
        let spread = spread.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        delay.mul_f64(factor).min(self.policy.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn set_base(&mut self, base: Duration) {
        self.base = base.min(self.policy.max);
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
