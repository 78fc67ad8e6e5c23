//! Event sink system for observability.
//!
//! Pipelines emit one event per lifecycle step. The event type names are
//! stable and listed here.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A pipeline instance started classifying a post.
pub const MODERATION_STARTED: &str = "moderation.started";
/// A classifier call failed transiently.
pub const MODERATION_ATTEMPT_FAILED: &str = "moderation.attempt_failed";
/// A classifier call was rate limited.
pub const MODERATION_RATE_LIMITED: &str = "moderation.rate_limited";
/// An outcome policy was chosen.
pub const MODERATION_DECIDED: &str = "moderation.decided";
/// The post was handed to human review.
pub const MODERATION_ESCALATED: &str = "moderation.escalated";
/// The run stopped because of shutdown.
pub const MODERATION_CANCELLED: &str = "moderation.cancelled";
/// The run reached its final state.
pub const MODERATION_COMPLETED: &str = "moderation.completed";
