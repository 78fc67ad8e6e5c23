//! Pipeline building and execution.
//!
//! This module provides:
//! - The retry policy and scheduler for classifier calls
//! - The outcome classifier
//! - The side-effect dispatcher
//! - The orchestrator and its builder
//! - The background spawner with its duplicate-run registry

mod dispatch;
mod orchestrator;
mod outcome;
mod registry;
mod retry;
mod scheduler;
mod spawner;

pub use dispatch::{
    rejection_comment, translation_comment, DispatchReport, Effect, EffectFailure,
    SideEffectDispatcher, APPROVAL_COMMENT,
};
pub use orchestrator::{
    EscalationReason, ModerationPipeline, ModerationPipelineBuilder, PipelineReport, RunOutcome,
};
pub use outcome::{classify, OutcomePolicy, LANGUAGE_REASON};
pub use registry::{RunRegistry, RunStatus, DEFAULT_RETENTION};
pub use retry::{
    JitterStrategy, RetryPolicy, DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_MAX_RETRY_AFTER,
    DEFAULT_RETRY_DELAYS,
};
pub use scheduler::{AttemptStats, ExhaustionReason, RetryOutcome, RetryScheduler};
pub use spawner::{ModerationSpawner, ShutdownReport, SpawnOutcome};
