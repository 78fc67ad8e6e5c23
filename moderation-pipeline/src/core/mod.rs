//! Core data types for the moderation pipeline.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`ModerationInput`]: the content snapshot sent to the classifier
//! - [`ModerationVerdict`]: one classifier answer
//! - [`PostStatus`] and [`PipelineState`]
//! - Records written by the dispatcher: [`Comment`], [`Flag`], [`Notification`]

mod input;
mod records;
mod status;
mod verdict;

pub use input::{AuthorKind, ModerationInput, PostKind};
pub use records::{
    Comment, CommentAuthorType, Flag, ModerationResultNotice, Notification,
    NotificationRecipient, NotificationType, MODERATION_FAILED_REASON, SYSTEM_MODERATOR_ID,
    SYSTEM_REPORTER_ID,
};
pub use status::{PipelineState, PostStatus};
pub use verdict::ModerationVerdict;
