//! Ports - the external collaborators the pipeline consumes.
//!
//! The pipeline owns none of these. Persistence, notification delivery and
//! the classifier itself are supplied by the host application. Optional
//! collaborators have explicit no-op implementations so the orchestrator
//! never branches on whether one is configured.

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{Comment, Flag, ModerationInput, ModerationResultNotice, ModerationVerdict, PostStatus};
use crate::errors::{ClassifierError, CollaboratorResult};

/// The external content classifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModerationClient: Send + Sync {
    /// Classifies one content snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::RateLimited`] when the service asks the
    /// caller to back off, [`ClassifierError::Transient`] for anything else.
    async fn moderate(&self, input: &ModerationInput) -> Result<ModerationVerdict, ClassifierError>;
}

/// Writes the post status. The pipeline is the only writer during a run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusUpdater: Send + Sync {
    /// Sets the post status.
    async fn set_status(&self, post_id: Uuid, status: PostStatus) -> CollaboratorResult<()>;

    /// Moves the post to draft and records its original language in one write.
    async fn set_draft_with_language(&self, post_id: Uuid, language: &str) -> CollaboratorResult<()>;
}

/// Stores comments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentCreator: Send + Sync {
    /// Creates a comment.
    async fn create(&self, comment: Comment) -> CollaboratorResult<()>;
}

/// Tells authors about moderation decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Notifies the author of a moderation result.
    async fn notify_moderation_result(&self, notice: ModerationResultNotice) -> CollaboratorResult<()>;
}

/// Stores escalation flags for human moderators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlagCreator: Send + Sync {
    /// Creates a flag.
    async fn create_flag(&self, flag: Flag) -> CollaboratorResult<()>;
}

/// A comment creator that discards comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCommentCreator;

#[async_trait]
impl CommentCreator for NoOpCommentCreator {
    async fn create(&self, comment: Comment) -> CollaboratorResult<()> {
        debug!(post_id = %comment.target_id, "No comment store configured, dropping comment");
        Ok(())
    }
}

/// A notification service that sends nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotificationService;

#[async_trait]
impl NotificationService for NoOpNotificationService {
    async fn notify_moderation_result(&self, notice: ModerationResultNotice) -> CollaboratorResult<()> {
        debug!(post_id = %notice.post_id, "No notification service configured, skipping");
        Ok(())
    }
}

/// A flag creator that discards flags.
///
/// Escalations are lost with this implementation, so each one is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpFlagCreator;

#[async_trait]
impl FlagCreator for NoOpFlagCreator {
    async fn create_flag(&self, flag: Flag) -> CollaboratorResult<()> {
        warn!(
            post_id = %flag.target_id,
            reason = %flag.reason,
            details = %flag.details,
            "No flag store configured, escalation not persisted"
        );
        Ok(())
    }
}
