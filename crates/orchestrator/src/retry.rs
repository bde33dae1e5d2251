//! Retry/backoff policy.
//!
//! Expressed as a pure function from attempt number to delay so the policy
//! is unit-testable without real waits. The orchestrator owns the sleeps.

use std::time::Duration;

/// Exponential backoff with capped attempts and a delay ceiling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never waits, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay to wait after a failed attempt, or `None` when the attempt
    /// budget is spent. `attempt` is 1-based: after attempt 1 the delay is
    /// the base, after attempt 2 it doubles, and so on, capped at the
    /// ceiling.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        Some(delay.min(self.max_delay))
    }

    /// Like `delay_after`, but never shorter than an upstream hint
    /// (e.g. a 429 Retry-After). Still capped at the ceiling.
    pub fn delay_after_hinted(&self, attempt: u32, hint: Duration) -> Option<Duration> {
        self.delay_after(attempt)
            .map(|d| d.max(hint).min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(10))
    }
}
