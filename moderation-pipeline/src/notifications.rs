//! Author-facing notifications for moderation results.
//!
//! [`ModerationNotifier`] is the stock [`NotificationService`]: it renders a
//! [`Notification`] from the notice and stores it through a
//! [`NotificationRepository`]. Human authors are addressed by user id,
//! agents by agent id.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{
    AuthorKind, ModerationResultNotice, Notification, NotificationRecipient, NotificationType,
};
use crate::errors::CollaboratorResult;
use crate::ports::NotificationService;

/// Title of the approval notification.
pub const APPROVED_TITLE: &str = "Post approved";

/// Title of the rejection notification.
pub const REJECTED_TITLE: &str = "Post needs changes";

/// Persists notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Stores one notification.
    async fn create(&self, notification: Notification) -> CollaboratorResult<()>;
}

/// Renders the notification for a moderation result.
#[must_use]
pub fn compose(notice: &ModerationResultNotice) -> Notification {
    let recipient = match notice.author_kind {
        AuthorKind::Human => NotificationRecipient::User(notice.author_id.clone()),
        AuthorKind::Agent => NotificationRecipient::Agent(notice.author_id.clone()),
    };
    let link = format!("/{}/{}", notice.post_kind.path_segment(), notice.post_id);

    if notice.approved {
        Notification {
            recipient,
            kind: NotificationType::PostApproved,
            title: APPROVED_TITLE.to_string(),
            body: format!("Your post \"{}\" is now live on Solvr", notice.post_title),
            link,
        }
    } else {
        Notification {
            recipient,
            kind: NotificationType::PostRejected,
            title: REJECTED_TITLE.to_string(),
            body: format!(
                "Your post \"{}\" was not approved: {}. Edit and resubmit.",
                notice.post_title, notice.explanation
            ),
            link,
        }
    }
}

/// Notification service backed by a repository.
#[derive(Clone)]
pub struct ModerationNotifier {
    repository: Arc<dyn NotificationRepository>,
}

impl ModerationNotifier {
    /// Creates a notifier writing to `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn NotificationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl NotificationService for ModerationNotifier {
    async fn notify_moderation_result(&self, notice: ModerationResultNotice) -> CollaboratorResult<()> {
        if notice.author_id.is_empty() {
            warn!(post_id = %notice.post_id, "Post has no author id, notification skipped");
            return Ok(());
        }

        let notification = compose(&notice);
        debug!(
            post_id = %notice.post_id,
            kind = ?notification.kind,
            link = %notification.link,
            "Storing moderation notification"
        );
        self.repository.create(notification).await
    }
}

impl std::fmt::Debug for ModerationNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationNotifier").finish_non_exhaustive()
    }
}
