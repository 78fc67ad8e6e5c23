//! Assertions over pipeline reports and recorded side effects.

use super::RecordingStore;
use crate::core::{PipelineState, PostStatus, MODERATION_FAILED_REASON};
use crate::pipeline::{PipelineReport, RunOutcome};

/// Asserts that the run decided and ended in `expected`.
pub fn assert_decided(report: &PipelineReport, expected: PipelineState) {
    assert_eq!(
        report.outcome,
        RunOutcome::Decided,
        "Expected a decision, got {:?}",
        report.outcome
    );
    assert_eq!(report.state, expected, "Expected state {expected}, got {}", report.state);
}

/// Asserts that the run escalated with exactly one flag and left the post
/// status untouched.
pub fn assert_escalated_once(report: &PipelineReport, store: &RecordingStore) {
    assert!(report.is_escalated(), "Expected escalation, got {:?}", report.outcome);
    assert_eq!(report.state, PipelineState::Escalated);

    let flags = store.flags_for(report.post_id);
    assert_eq!(flags.len(), 1, "Expected exactly one flag, got {flags:?}");
    assert_eq!(flags[0].reason, MODERATION_FAILED_REASON);
}

/// Asserts that nothing observable happened to the post.
pub fn assert_untouched(report: &PipelineReport, store: &RecordingStore) {
    assert_eq!(store.status_of(report.post_id), None::<PostStatus>);
    assert!(store.comments().iter().all(|c| c.target_id != report.post_id));
    assert!(store.flags_for(report.post_id).is_empty());
}
