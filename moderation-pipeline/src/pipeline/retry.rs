//! Retry policy for classifier calls.
//!
//! The policy is an explicit value handed to the pipeline builder. It
//! describes the backoff delays between transient failures and the ceiling
//! applied to rate-limited retries, which do not draw from the attempt
//! budget.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ModerationError;

/// Default delays between transient failures: 2s, 4s, 8s.
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

/// Default number of rate-limited retries allowed in one run.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 10;

/// Default cap on a single server-supplied retry-after wait.
pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Full => {
                if millis == 0 {
                    delay
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                }
            }
            Self::Equal => {
                let half = millis / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
                }
            }
        }
    }
}

/// Backoff and rate-limit policy for one pipeline run.
///
/// The attempt budget is one initial call plus one retry per configured
/// delay. Rate-limited failures are retried after the classifier's own
/// retry-after (capped at `max_retry_after`), at most
/// `max_rate_limit_retries` times per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    max_rate_limit_retries: u32,
    max_retry_after: Duration,
    jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAYS.to_vec())
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit backoff delays, consumed in order.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
            jitter: JitterStrategy::None,
        }
    }

    /// Creates a policy whose delays double from `base`: base, 2*base, 4*base...
    #[must_use]
    pub fn exponential(base: Duration, retries: usize) -> Self {
        let delays = (0..retries)
            .map(|attempt| {
                let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
                base.saturating_mul(factor)
            })
            .collect();
        Self::new(delays)
    }

    /// Creates a policy with a single attempt and no transient retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(Vec::new())
    }

    /// Sets the rate-limited retry ceiling.
    #[must_use]
    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    /// Sets the cap on a single retry-after wait.
    #[must_use]
    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    /// Sets the jitter strategy applied to backoff delays.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// The configured backoff delays.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total classifier calls allowed before escalation, ignoring rate limits.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Rate-limited retries allowed per run.
    #[must_use]
    pub fn max_rate_limit_retries(&self) -> u32 {
        self.max_rate_limit_retries
    }

    /// Returns the wait before the next call after `transient_failures`
    /// transient failures, or `None` once the budget is spent.
    #[must_use]
    pub fn delay_after(&self, transient_failures: usize) -> Option<Duration> {
        let index = transient_failures.checked_sub(1)?;
        self.delays.get(index).map(|delay| self.jitter.apply(*delay))
    }

    /// Caps a server-supplied retry-after.
    #[must_use]
    pub fn clamp_retry_after(&self, retry_after: Duration) -> Duration {
        retry_after.min(self.max_retry_after)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::InvalidPolicy`] if the retry-after cap is zero,
    /// which would turn rate limiting into a busy loop.
    pub fn validate(&self) -> Result<(), ModerationError> {
        if self.max_retry_after.is_zero() {
            return Err(ModerationError::InvalidPolicy(
                "max_retry_after must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delays(), &DEFAULT_RETRY_DELAYS);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.max_rate_limit_retries(), DEFAULT_MAX_RATE_LIMIT_RETRIES);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delays_consumed_in_order() {
        let policy = RetryPolicy::new(vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40),
        ]);

        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(40)));
        assert_eq!(policy.delay_after(4), None);
        assert_eq!(policy.delay_after(0), None);
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(Duration::from_secs(2), 3);
        assert_eq!(
            policy.delays(),
            &[
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn test_clamp_retry_after() {
        let policy = RetryPolicy::default().with_max_retry_after(Duration::from_secs(30));
        assert_eq!(policy.clamp_retry_after(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(policy.clamp_retry_after(Duration::from_secs(600)), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_retry_after_cap_is_invalid() {
        let policy = RetryPolicy::default().with_max_retry_after(Duration::ZERO);
        assert!(matches!(policy.validate(), Err(ModerationError::InvalidPolicy(_))));
    }

    #[test]
    fn test_full_jitter_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            assert!(JitterStrategy::Full.apply(delay) <= delay);
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let jittered = JitterStrategy::Equal.apply(delay);
            assert!(jittered >= Duration::from_millis(50));
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn test_no_jitter() {
        let delay = Duration::from_secs(4);
        assert_eq!(JitterStrategy::None.apply(delay), delay);
    }
}
