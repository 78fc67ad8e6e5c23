//! Mapping a classifier verdict to the pipeline's final decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{ModerationVerdict, PipelineState, PostStatus};

/// The only rejection reason that may lead to a hold instead of a rejection.
pub const LANGUAGE_REASON: &str = "language";

/// The decision taken for a post. Chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "language")]
pub enum OutcomePolicy {
    /// Publish the post.
    Approve,
    /// Reject the post; the author may edit and resubmit.
    Reject,
    /// Move the post to draft until it is translated from the given language.
    HoldForTranslation(String),
}

impl OutcomePolicy {
    /// The post status this policy writes.
    #[must_use]
    pub fn target_status(&self) -> PostStatus {
        match self {
            Self::Approve => PostStatus::Open,
            Self::Reject => PostStatus::Rejected,
            Self::HoldForTranslation(_) => PostStatus::Draft,
        }
    }

    /// The terminal pipeline state reached when this policy is dispatched.
    #[must_use]
    pub fn terminal_state(&self) -> PipelineState {
        match self {
            Self::Approve => PipelineState::Approved,
            Self::Reject => PipelineState::Rejected,
            Self::HoldForTranslation(_) => PipelineState::HeldForTranslation,
        }
    }
}

impl fmt::Display for OutcomePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::HoldForTranslation(language) => write!(f, "hold_for_translation({language})"),
        }
    }
}

/// Decides the outcome for a verdict.
///
/// 1. Approved verdicts are approved, whatever reasons they carry.
/// 2. A rejection whose only reason is "language", with a detected language
///    other than English, is held for translation.
/// 3. Everything else is rejected.
#[must_use]
pub fn classify(verdict: &ModerationVerdict) -> OutcomePolicy {
    if verdict.approved {
        return OutcomePolicy::Approve;
    }
    if is_language_only_rejection(verdict) {
        return OutcomePolicy::HoldForTranslation(verdict.language_detected.clone());
    }
    OutcomePolicy::Reject
}

fn is_language_only_rejection(verdict: &ModerationVerdict) -> bool {
    let language = verdict.language_detected.trim();
    if language.is_empty() || is_english(language) {
        return false;
    }
    matches!(
        verdict.rejection_reasons.as_slice(),
        [reason] if reason.trim().eq_ignore_ascii_case(LANGUAGE_REASON)
    )
}

fn is_english(language: &str) -> bool {
    language.eq_ignore_ascii_case("en") || language.eq_ignore_ascii_case("english")
}
