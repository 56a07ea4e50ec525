//! Bounded fixed-interval retry driven by an injectable timer.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock timer backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: NonZeroU32,
}

impl RetryPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
    pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(79);

    pub fn new(interval: Duration, max_attempts: NonZeroU32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Worst-case wall time spent waiting between attempts.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.get()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Hands out attempt numbers `1..=max_attempts`, waiting one interval before
/// each. Stops early once the token is cancelled.
pub struct BoundedRetry {
    policy: RetryPolicy,
    timer: Arc<dyn Timer>,
    cancel: CancellationToken,
    attempts: u32,
}

impl BoundedRetry {
    pub fn new(policy: RetryPolicy, timer: Arc<dyn Timer>, cancel: CancellationToken) -> Self {
        Self {
            policy,
            timer,
            cancel,
            attempts: 0,
        }
    }

    /// Wait for the next slot. `None` when the budget is spent or the
    /// token fired.
    pub async fn next_attempt(&mut self) -> Option<u32> {
        if self.attempts >= self.policy.max_attempts.get() || self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = self.timer.sleep(self.policy.interval) => {}
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts.get()
    }
}
