//! Retry policy: decides the delay the engine is asked to wait before
//! redelivering a failed task.

use std::time::Duration;

/// Exponential backoff policy for technical failures.
///
/// The worker never decides *whether* a task is retried — the engine owns
/// the retry counter. This policy only shapes the `retryTimeout` passed
/// through with each failure report.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay requested after the first failure.
    pub base_delay: Duration,

    /// Backoff multiplier applied per consumed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay before the next attempt, given how many attempts have already
    /// failed (1-indexed): `base_delay * multiplier^(attempts - 1)`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        Duration::from_secs_f64(delay_secs)
    }
}
