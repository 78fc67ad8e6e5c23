//! Post status and pipeline state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Visibility status of a post, as stored by the post repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Created and waiting for moderation.
    #[default]
    PendingReview,
    /// Approved and visible in the feed.
    Open,
    /// Rejected; the author may edit and resubmit.
    Rejected,
    /// Held for translation; not visible.
    Draft,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingReview => write!(f, "pending_review"),
            Self::Open => write!(f, "open"),
            Self::Rejected => write!(f, "rejected"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

/// State of one moderation pipeline instance.
///
/// `Created -> Classifying -> {Approved, Rejected, HeldForTranslation, Escalated}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Instance exists but has not called the classifier yet.
    #[default]
    Created,
    /// Calling the classifier, possibly sleeping between attempts.
    Classifying,
    /// Post was made visible.
    Approved,
    /// Post was rejected.
    Rejected,
    /// Post was moved to draft pending translation.
    HeldForTranslation,
    /// Classifier never answered or the outcome could not be stored; a flag was raised.
    Escalated,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Classifying => write!(f, "classifying"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::HeldForTranslation => write!(f, "held_for_translation"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

impl PipelineState {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::HeldForTranslation | Self::Escalated
        )
    }

    /// Returns true if the state may move to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Created => next == Self::Classifying,
            Self::Classifying => next.is_terminal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_status_display() {
        assert_eq!(PostStatus::PendingReview.to_string(), "pending_review");
        assert_eq!(PostStatus::Open.to_string(), "open");
        assert_eq!(PostStatus::Rejected.to_string(), "rejected");
        assert_eq!(PostStatus::Draft.to_string(), "draft");
    }

    #[test]
    fn test_post_status_serialize() {
        let json = serde_json::to_string(&PostStatus::PendingReview).unwrap();
        assert_eq!(json, r#""pending_review""#);

        let status: PostStatus = serde_json::from_str(r#""draft""#).unwrap();
        assert_eq!(status, PostStatus::Draft);
    }

    #[test]
    fn test_pipeline_state_is_terminal() {
        assert!(!PipelineState::Created.is_terminal());
        assert!(!PipelineState::Classifying.is_terminal());
        assert!(PipelineState::Approved.is_terminal());
        assert!(PipelineState::Rejected.is_terminal());
        assert!(PipelineState::HeldForTranslation.is_terminal());
        assert!(PipelineState::Escalated.is_terminal());
    }

    #[test]
    fn test_pipeline_state_transitions() {
        assert!(PipelineState::Created.can_transition_to(PipelineState::Classifying));
        assert!(!PipelineState::Created.can_transition_to(PipelineState::Approved));
        assert!(PipelineState::Classifying.can_transition_to(PipelineState::Escalated));
        assert!(!PipelineState::Classifying.can_transition_to(PipelineState::Classifying));
        assert!(!PipelineState::Approved.can_transition_to(PipelineState::Classifying));
    }
}
