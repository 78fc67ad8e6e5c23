//! The moderation pipeline: classify one post and apply the outcome.
//!
//! ```text
//! Created -> Classifying -> Approved
//!                        -> Rejected
//!                        -> HeldForTranslation
//!                        -> Escalated
//! ```
//!
//! A run starts classifying immediately, never re-enters `Classifying` and
//! reaches exactly one terminal state, unless it is cancelled by shutdown,
//! in which case it stops where it is and dispatches nothing.

use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    classify, AttemptStats, DispatchReport, ExhaustionReason, OutcomePolicy, RetryOutcome,
    RetryPolicy, RetryScheduler, SideEffectDispatcher,
};
use crate::cancellation::CancellationToken;
use crate::core::{ModerationInput, PipelineState};
use crate::errors::ModerationError;
use crate::events::{
    EventSink, NoOpEventSink, MODERATION_CANCELLED, MODERATION_COMPLETED, MODERATION_DECIDED,
    MODERATION_ESCALATED, MODERATION_STARTED,
};
use crate::ports::{
    CommentCreator, FlagCreator, ModerationClient, NoOpCommentCreator, NoOpFlagCreator,
    NoOpNotificationService, NotificationService, StatusUpdater,
};

/// Why a run ended with a flag instead of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Every attempt failed transiently.
    AttemptBudget,
    /// The classifier rate limited past the ceiling.
    RateLimitCeiling,
    /// A decision was made but the status could not be written.
    StatusUpdateFailed,
}

impl From<ExhaustionReason> for EscalationReason {
    fn from(reason: ExhaustionReason) -> Self {
        match reason {
            ExhaustionReason::AttemptBudget => Self::AttemptBudget,
            ExhaustionReason::RateLimitCeiling => Self::RateLimitCeiling,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum RunOutcome {
    /// A policy was chosen and its status written.
    Decided,
    /// A flag was raised for manual review.
    Escalated(EscalationReason),
    /// Shutdown interrupted the run. The post keeps its pending status.
    Cancelled,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// The moderated post.
    pub post_id: Uuid,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Final state. `Classifying` only for cancelled runs.
    pub state: PipelineState,
    /// Chosen policy, if the classifier answered.
    pub policy: Option<OutcomePolicy>,
    /// Classifier call counters.
    pub attempts: AttemptStats,
    /// Side effects applied.
    pub dispatch: DispatchReport,
    /// Wall time of the run in milliseconds.
    pub elapsed_ms: u64,
}

impl PipelineReport {
    /// Returns true if the run escalated.
    #[must_use]
    pub fn is_escalated(&self) -> bool {
        matches!(self.outcome, RunOutcome::Escalated(_))
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }
}

/// State machine for a single run.
struct RunState {
    post_id: Uuid,
    state: PipelineState,
}

impl RunState {
    fn new(post_id: Uuid) -> Self {
        Self {
            post_id,
            state: PipelineState::Created,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        debug!(post_id = %self.post_id, from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }
}

/// Classifies posts and applies the outcome.
///
/// Built once with its collaborators and shared across runs; each call to
/// [`run`](Self::run) is an independent pipeline instance for one post.
#[derive(Clone)]
pub struct ModerationPipeline {
    client: Arc<dyn ModerationClient>,
    scheduler: Arc<RetryScheduler>,
    dispatcher: SideEffectDispatcher,
    events: Arc<dyn EventSink>,
}

impl ModerationPipeline {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ModerationPipelineBuilder {
        ModerationPipelineBuilder::new()
    }

    /// The retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        self.scheduler.policy()
    }

    /// Runs the pipeline for one post to completion.
    pub async fn run(&self, input: ModerationInput) -> PipelineReport {
        let started = Instant::now();
        let post_id = input.post_id();
        let mut run = RunState::new(post_id);

        run.advance(PipelineState::Classifying);
        info!(
            post_id = %post_id,
            max_attempts = self.policy().max_attempts(),
            "Starting content moderation"
        );
        self.events.try_emit(
            MODERATION_STARTED,
            Some(serde_json::json!({
                "post_id": post_id.to_string(),
                "post_kind": input.post_kind().as_str(),
                "max_attempts": self.policy().max_attempts(),
            })),
        );

        let outcome = self
            .scheduler
            .run(post_id, || self.client.moderate(&input))
            .await;
        let attempts = outcome.stats();

        let (outcome, policy, dispatch) = match outcome {
            RetryOutcome::Verdict { value: verdict, .. } => {
                let policy = classify(&verdict);
                info!(
                    post_id = %post_id,
                    policy = %policy,
                    approved = verdict.approved,
                    reasons = ?verdict.rejection_reasons,
                    language = %verdict.language_detected,
                    "Moderation decided"
                );
                self.events.try_emit(
                    MODERATION_DECIDED,
                    Some(serde_json::json!({
                        "post_id": post_id.to_string(),
                        "policy": &policy,
                        "approved": verdict.approved,
                        "rejection_reasons": &verdict.rejection_reasons,
                        "calls": attempts.calls,
                    })),
                );

                let dispatch = self.dispatcher.dispatch(&input, &policy, &verdict).await;
                if dispatch.status_failed() {
                    run.advance(PipelineState::Escalated);
                    self.emit_escalated(post_id, EscalationReason::StatusUpdateFailed, &dispatch);
                    (
                        RunOutcome::Escalated(EscalationReason::StatusUpdateFailed),
                        Some(policy),
                        dispatch,
                    )
                } else {
                    run.advance(policy.terminal_state());
                    (RunOutcome::Decided, Some(policy), dispatch)
                }
            }
            RetryOutcome::Exhausted {
                reason, last_error, ..
            } => {
                let details = match reason {
                    ExhaustionReason::AttemptBudget => format!(
                        "Content moderation failed after {} attempts: {last_error}",
                        attempts.calls
                    ),
                    ExhaustionReason::RateLimitCeiling => format!(
                        "Content moderation rate limited {} times: {last_error}",
                        attempts.rate_limited
                    ),
                };
                error!(post_id = %post_id, reason = ?reason, "{details}");

                let dispatch = self.dispatcher.escalate(post_id, details).await;
                run.advance(PipelineState::Escalated);
                let reason = EscalationReason::from(reason);
                self.emit_escalated(post_id, reason, &dispatch);
                (RunOutcome::Escalated(reason), None, dispatch)
            }
            RetryOutcome::Cancelled { .. } => {
                warn!(post_id = %post_id, calls = attempts.calls, "Moderation run cancelled");
                self.events.try_emit(
                    MODERATION_CANCELLED,
                    Some(serde_json::json!({
                        "post_id": post_id.to_string(),
                        "calls": attempts.calls,
                    })),
                );
                (RunOutcome::Cancelled, None, DispatchReport::default())
            }
        };

        let report = PipelineReport {
            post_id,
            outcome,
            state: run.state,
            policy,
            attempts,
            dispatch,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            post_id = %post_id,
            state = %report.state,
            calls = report.attempts.calls,
            elapsed_ms = report.elapsed_ms,
            "Content moderation finished"
        );
        self.events
            .try_emit(MODERATION_COMPLETED, serde_json::to_value(&report).ok());

        report
    }

    fn emit_escalated(&self, post_id: Uuid, reason: EscalationReason, dispatch: &DispatchReport) {
        self.events.try_emit(
            MODERATION_ESCALATED,
            Some(serde_json::json!({
                "post_id": post_id.to_string(),
                "reason": reason,
                "flag_raised": dispatch.flag_raised,
            })),
        );
    }
}

impl std::fmt::Debug for ModerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationPipeline")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ModerationPipeline`].
///
/// The classifier client and the status updater are required. Comment,
/// notification and flag collaborators default to no-op implementations.
#[derive(Default)]
pub struct ModerationPipelineBuilder {
    client: Option<Arc<dyn ModerationClient>>,
    status_updater: Option<Arc<dyn StatusUpdater>>,
    comments: Option<Arc<dyn CommentCreator>>,
    notifications: Option<Arc<dyn NotificationService>>,
    flags: Option<Arc<dyn FlagCreator>>,
    policy: RetryPolicy,
    events: Option<Arc<dyn EventSink>>,
    cancel_token: Option<Arc<CancellationToken>>,
}

impl ModerationPipelineBuilder {
    /// Creates an empty builder with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the classifier client.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn ModerationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the status updater.
    #[must_use]
    pub fn with_status_updater(mut self, updater: Arc<dyn StatusUpdater>) -> Self {
        self.status_updater = Some(updater);
        self
    }

    /// Sets the comment creator.
    #[must_use]
    pub fn with_comment_creator(mut self, comments: Arc<dyn CommentCreator>) -> Self {
        self.comments = Some(comments);
        self
    }

    /// Sets the notification service.
    #[must_use]
    pub fn with_notification_service(mut self, notifications: Arc<dyn NotificationService>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Sets the flag creator.
    #[must_use]
    pub fn with_flag_creator(mut self, flags: Arc<dyn FlagCreator>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the cancellation token observed between attempts.
    #[must_use]
    pub fn with_cancel_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::MissingCollaborator`] if the client or the
    /// status updater is missing, [`ModerationError::InvalidPolicy`] if the
    /// retry policy does not validate.
    pub fn build(self) -> Result<ModerationPipeline, ModerationError> {
        let client = self
            .client
            .ok_or(ModerationError::MissingCollaborator("moderation client"))?;
        let status_updater = self
            .status_updater
            .ok_or(ModerationError::MissingCollaborator("status updater"))?;
        self.policy.validate()?;

        let events = self.events.unwrap_or_else(|| Arc::new(NoOpEventSink));
        let cancel_token = self
            .cancel_token
            .unwrap_or_else(|| Arc::new(CancellationToken::new()));

        let dispatcher = SideEffectDispatcher::new(
            status_updater,
            self.comments.unwrap_or_else(|| Arc::new(NoOpCommentCreator)),
            self.notifications
                .unwrap_or_else(|| Arc::new(NoOpNotificationService)),
            self.flags.unwrap_or_else(|| Arc::new(NoOpFlagCreator)),
        );

        Ok(ModerationPipeline {
            client,
            scheduler: Arc::new(RetryScheduler::new(self.policy, cancel_token, events.clone())),
            dispatcher,
            events,
        })
    }
}

impl std::fmt::Debug for ModerationPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationPipelineBuilder")
            .field("has_client", &self.client.is_some())
            .field("has_status_updater", &self.status_updater.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
