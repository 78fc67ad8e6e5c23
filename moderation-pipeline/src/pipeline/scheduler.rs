//! The retry scheduler: repeated classifier calls under a [`RetryPolicy`].

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::RetryPolicy;
use crate::cancellation::CancellationToken;
use crate::errors::ClassifierError;
use crate::events::{EventSink, MODERATION_ATTEMPT_FAILED, MODERATION_RATE_LIMITED};

/// Counters for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptStats {
    /// Classifier calls made, including rate-limited ones.
    pub calls: u32,
    /// Calls that failed transiently. These draw from the budget.
    pub transient_failures: u32,
    /// Calls that were rate limited. These do not.
    pub rate_limited: u32,
}

/// Why the scheduler gave up without a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// Every attempt in the budget failed transiently.
    AttemptBudget,
    /// The classifier kept rate limiting past the policy's ceiling.
    RateLimitCeiling,
}

/// Result of a scheduler run.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    /// The operation produced a value.
    Verdict {
        /// The value returned by the last call.
        value: T,
        /// Call counters.
        stats: AttemptStats,
    },
    /// The operation never produced a value.
    Exhausted {
        /// Which limit was hit.
        reason: ExhaustionReason,
        /// The last failure observed.
        last_error: ClassifierError,
        /// Call counters.
        stats: AttemptStats,
    },
    /// Cancellation was requested while sleeping between calls.
    Cancelled {
        /// Call counters.
        stats: AttemptStats,
    },
}

impl<T> RetryOutcome<T> {
    /// Returns the call counters.
    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        match self {
            Self::Verdict { stats, .. } | Self::Exhausted { stats, .. } | Self::Cancelled { stats } => {
                *stats
            }
        }
    }

    /// Returns true if the scheduler gave up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Drives repeated calls of a fallible operation.
///
/// Transient failures consume the attempt budget and are followed by the
/// next backoff delay. Rate-limited failures sleep for the classifier's
/// retry-after instead and only count against the rate-limit ceiling.
pub struct RetryScheduler {
    policy: RetryPolicy,
    cancel_token: Arc<CancellationToken>,
    events: Arc<dyn EventSink>,
}

impl RetryScheduler {
    /// Creates a new scheduler.
    #[must_use]
    pub fn new(
        policy: RetryPolicy,
        cancel_token: Arc<CancellationToken>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            policy,
            cancel_token,
            events,
        }
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Calls `operation` until it succeeds or a limit is reached.
    pub async fn run<T, F, Fut>(&self, post_id: Uuid, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifierError>>,
    {
        let mut stats = AttemptStats::default();

        loop {
            stats.calls += 1;
            let err = match operation().await {
                Ok(value) => return RetryOutcome::Verdict { value, stats },
                Err(err) => err,
            };

            let wait = if let Some(retry_after) = err.retry_after() {
                stats.rate_limited += 1;
                if stats.rate_limited > self.policy.max_rate_limit_retries() {
                    error!(
                        post_id = %post_id,
                        rate_limited = stats.rate_limited,
                        "Moderation rate limited past ceiling, giving up"
                    );
                    return RetryOutcome::Exhausted {
                        reason: ExhaustionReason::RateLimitCeiling,
                        last_error: err,
                        stats,
                    };
                }

                let wait = self.policy.clamp_retry_after(retry_after);
                let retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                warn!(post_id = %post_id, retry_after_ms, "Moderation rate limited, retrying");
                self.events.try_emit(
                    MODERATION_RATE_LIMITED,
                    Some(serde_json::json!({
                        "post_id": post_id.to_string(),
                        "retry_after_ms": retry_after_ms,
                        "rate_limited": stats.rate_limited,
                    })),
                );
                wait
            } else {
                stats.transient_failures += 1;
                warn!(
                    post_id = %post_id,
                    attempt = stats.transient_failures,
                    error = %err,
                    "Moderation attempt failed"
                );
                self.events.try_emit(
                    MODERATION_ATTEMPT_FAILED,
                    Some(serde_json::json!({
                        "post_id": post_id.to_string(),
                        "attempt": stats.transient_failures,
                        "error": err.to_string(),
                    })),
                );

                let Some(delay) = self.policy.delay_after(stats.transient_failures as usize) else {
                    error!(
                        post_id = %post_id,
                        attempts = stats.transient_failures,
                        "Moderation failed after all retries"
                    );
                    return RetryOutcome::Exhausted {
                        reason: ExhaustionReason::AttemptBudget,
                        last_error: err,
                        stats,
                    };
                };
                delay
            };

            if self.cancel_token.sleep(wait).await {
                warn!(post_id = %post_id, "Moderation cancelled between attempts");
                return RetryOutcome::Cancelled { stats };
            }
        }
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}
