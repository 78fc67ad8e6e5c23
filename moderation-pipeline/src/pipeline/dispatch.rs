//! Side-effect dispatch: applying a decided outcome to the outside world.
//!
//! | Outcome | Status | Comment | Notification | Flag |
//! |---|---|---|---|---|
//! | Approve | open | approval | approved | - |
//! | Reject | rejected | explanation + resubmit | rejected | - |
//! | Hold | draft + language | translation notice | - | - |
//! | Exhausted | - | - | - | `moderation_failed` |
//!
//! The status write is the commit point. Comment and notification failures
//! are logged and reported but never undo it. A failed status write skips
//! the echoes and escalates instead.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::OutcomePolicy;
use crate::core::{Comment, Flag, ModerationInput, ModerationResultNotice, ModerationVerdict, PostStatus};
use crate::ports::{CommentCreator, FlagCreator, NotificationService, StatusUpdater};

/// System comment left on approved posts.
pub const APPROVAL_COMMENT: &str =
    "Post approved by Solvr moderation. Your post is now visible in the feed.";

/// Renders the system comment left on rejected posts.
#[must_use]
pub fn rejection_comment(explanation: &str) -> String {
    format!(
        "Post rejected by Solvr moderation.\n\nReason: {explanation}\n\nYou can edit your post and resubmit for review."
    )
}

/// Renders the system comment left on posts held for translation.
#[must_use]
pub fn translation_comment(language: &str) -> String {
    format!(
        "Your post appears to be in {language}. We'll automatically translate it to English and resubmit for review — this typically takes up to 24 hours."
    )
}

/// One kind of side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Post status write.
    Status,
    /// System comment.
    Comment,
    /// Author notification.
    Notification,
    /// Escalation flag.
    Flag,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Comment => write!(f, "comment"),
            Self::Notification => write!(f, "notification"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

/// A side effect that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectFailure {
    /// Which effect failed.
    pub effect: Effect,
    /// The collaborator's error message.
    pub error: String,
}

/// What a dispatch actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Status written, if the write succeeded.
    pub status: Option<PostStatus>,
    /// Whether a system comment was stored.
    pub comment_created: bool,
    /// Whether the author notification was sent.
    pub notification_sent: bool,
    /// Whether an escalation flag was stored.
    pub flag_raised: bool,
    /// Effects that failed.
    pub failures: Vec<EffectFailure>,
}

impl DispatchReport {
    /// Returns true if the status write was attempted and failed.
    #[must_use]
    pub fn status_failed(&self) -> bool {
        self.failures.iter().any(|f| f.effect == Effect::Status)
    }

    /// Returns true if every attempted effect succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, effect: Effect, error: &anyhow::Error) {
        self.failures.push(EffectFailure {
            effect,
            error: format!("{error:#}"),
        });
    }
}

/// Applies outcome rows through the injected collaborators.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    status_updater: Arc<dyn StatusUpdater>,
    comments: Arc<dyn CommentCreator>,
    notifications: Arc<dyn NotificationService>,
    flags: Arc<dyn FlagCreator>,
}

impl SideEffectDispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(
        status_updater: Arc<dyn StatusUpdater>,
        comments: Arc<dyn CommentCreator>,
        notifications: Arc<dyn NotificationService>,
        flags: Arc<dyn FlagCreator>,
    ) -> Self {
        Self {
            status_updater,
            comments,
            notifications,
            flags,
        }
    }

    /// Applies the row for a decided policy.
    pub async fn dispatch(
        &self,
        input: &ModerationInput,
        policy: &OutcomePolicy,
        verdict: &ModerationVerdict,
    ) -> DispatchReport {
        let post_id = input.post_id();
        let mut report = DispatchReport::default();

        let written = match policy {
            OutcomePolicy::HoldForTranslation(language) => {
                self.status_updater.set_draft_with_language(post_id, language).await
            }
            _ => self.status_updater.set_status(post_id, policy.target_status()).await,
        };
        if let Err(e) = written {
            error!(
                post_id = %post_id,
                status = %policy.target_status(),
                error = %e,
                "Failed to update post status after moderation"
            );
            report.record_failure(Effect::Status, &e);
            let details = format!(
                "Content moderation decided '{policy}' but the status update failed: {e:#}"
            );
            self.raise_flag(post_id, details, &mut report).await;
            return report;
        }
        report.status = Some(policy.target_status());

        let comment = match policy {
            OutcomePolicy::Approve => APPROVAL_COMMENT.to_string(),
            OutcomePolicy::Reject => rejection_comment(&verdict.explanation),
            OutcomePolicy::HoldForTranslation(language) => translation_comment(language),
        };
        match self.comments.create(Comment::system(post_id, comment)).await {
            Ok(()) => report.comment_created = true,
            Err(e) => {
                error!(post_id = %post_id, error = %e, "Failed to create moderation comment");
                report.record_failure(Effect::Comment, &e);
            }
        }

        // Drafts are not author-facing rejections.
        if !matches!(policy, OutcomePolicy::HoldForTranslation(_)) {
            self.notify_author(input, policy, verdict, &mut report).await;
        }

        info!(
            post_id = %post_id,
            policy = %policy,
            comment_created = report.comment_created,
            notification_sent = report.notification_sent,
            "Moderation outcome dispatched"
        );
        report
    }

    async fn notify_author(
        &self,
        input: &ModerationInput,
        policy: &OutcomePolicy,
        verdict: &ModerationVerdict,
        report: &mut DispatchReport,
    ) {
        let post_id = input.post_id();
        if input.author_id().is_empty() {
            warn!(post_id = %post_id, "Post has no author id, moderation notification not sent");
            return;
        }
        let notice = ModerationResultNotice::for_input(
            input,
            matches!(policy, OutcomePolicy::Approve),
            verdict.explanation.clone(),
        );
        match self.notifications.notify_moderation_result(notice).await {
            Ok(()) => report.notification_sent = true,
            Err(e) => {
                error!(post_id = %post_id, error = %e, "Failed to send moderation notification");
                report.record_failure(Effect::Notification, &e);
            }
        }
    }

    /// Applies the exhaustion row: one flag, nothing else.
    pub async fn escalate(&self, post_id: Uuid, details: impl Into<String>) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.raise_flag(post_id, details.into(), &mut report).await;
        report
    }

    async fn raise_flag(&self, post_id: Uuid, details: String, report: &mut DispatchReport) {
        match self.flags.create_flag(Flag::moderation_failed(post_id, details)).await {
            Ok(()) => {
                info!(post_id = %post_id, "Post escalated for manual review");
                report.flag_raised = true;
            }
            Err(e) => {
                error!(post_id = %post_id, error = %e, "Failed to create moderation failure flag");
                report.record_failure(Effect::Flag, &e);
            }
        }
    }
}

impl fmt::Debug for SideEffectDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AuthorKind;
    use crate::ports::{MockCommentCreator, MockFlagCreator, MockNotificationService, MockStatusUpdater};
    use crate::testing::RecordingStore;
    use pretty_assertions::assert_eq;

    fn input() -> ModerationInput {
        ModerationInput::new(Uuid::new_v4(), "How do I handle async operations in Go?", "body")
            .with_author(AuthorKind::Human, "user-123")
    }

    fn dispatcher_for(store: &Arc<RecordingStore>) -> SideEffectDispatcher {
        SideEffectDispatcher::new(store.clone(), store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_approve_row() {
        let store = Arc::new(RecordingStore::new());
        let input = input();

        let report = dispatcher_for(&store)
            .dispatch(&input, &OutcomePolicy::Approve, &ModerationVerdict::approved("fine"))
            .await;

        assert!(report.is_clean());
        assert_eq!(report.status, Some(PostStatus::Open));
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
        assert_eq!(store.comments()[0].content, APPROVAL_COMMENT);
        assert_eq!(store.notices().len(), 1);
        assert!(store.notices()[0].approved);
        assert!(store.flags().is_empty());
    }

    #[tokio::test]
    async fn test_reject_row() {
        let store = Arc::new(RecordingStore::new());
        let input = input();
        let verdict = ModerationVerdict::rejected("Promotional spam", ["SPAM"]);

        let report = dispatcher_for(&store)
            .dispatch(&input, &OutcomePolicy::Reject, &verdict)
            .await;

        assert!(report.notification_sent);
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Rejected));
        let comment = &store.comments()[0].content;
        assert!(comment.contains("Reason: Promotional spam"));
        assert!(comment.contains("edit your post and resubmit"));
        assert_eq!(store.notices()[0].explanation, "Promotional spam");
        assert!(!store.notices()[0].approved);
    }

    #[tokio::test]
    async fn test_hold_row_sends_no_notification() {
        let store = Arc::new(RecordingStore::new());
        let input = input();
        let policy = OutcomePolicy::HoldForTranslation("Portuguese".into());
        let verdict = ModerationVerdict::rejected("not English", ["LANGUAGE"]).with_language("Portuguese");

        let report = dispatcher_for(&store).dispatch(&input, &policy, &verdict).await;

        assert!(report.comment_created);
        assert!(!report.notification_sent);
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Draft));
        assert_eq!(store.language_of(input.post_id()), Some("Portuguese".to_string()));
        assert!(store.comments()[0].content.contains("Portuguese"));
        assert!(store.notices().is_empty());
    }

    #[tokio::test]
    async fn test_escalate_row() {
        let store = Arc::new(RecordingStore::new());
        let post_id = Uuid::new_v4();

        let report = dispatcher_for(&store).escalate(post_id, "failed after 4 attempts").await;

        assert!(report.flag_raised);
        assert_eq!(report.status, None);
        assert_eq!(store.status_of(post_id), None);
        assert!(store.comments().is_empty());
        let flags = store.flags();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].reason, "moderation_failed");
        assert_eq!(flags[0].details, "failed after 4 attempts");
    }

    #[tokio::test]
    async fn test_comment_failure_does_not_roll_back_status() {
        let store = Arc::new(RecordingStore::new());
        let mut comments = MockCommentCreator::new();
        comments
            .expect_create()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("comments table locked")));

        let dispatcher = SideEffectDispatcher::new(
            store.clone(),
            Arc::new(comments),
            store.clone(),
            store.clone(),
        );
        let input = input();

        let report = dispatcher
            .dispatch(&input, &OutcomePolicy::Approve, &ModerationVerdict::approved("ok"))
            .await;

        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
        assert!(!report.comment_created);
        assert!(report.notification_sent);
        assert_eq!(
            report.failures,
            vec![EffectFailure {
                effect: Effect::Comment,
                error: "comments table locked".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_notification_failure_is_reported() {
        let store = Arc::new(RecordingStore::new());
        let mut notifications = MockNotificationService::new();
        notifications
            .expect_notify_moderation_result()
            .returning(|_| Err(anyhow::anyhow!("webhook down")));

        let dispatcher = SideEffectDispatcher::new(
            store.clone(),
            store.clone(),
            Arc::new(notifications),
            store.clone(),
        );

        let report = dispatcher
            .dispatch(&input(), &OutcomePolicy::Reject, &ModerationVerdict::rejected("x", ["SPAM"]))
            .await;

        assert!(report.comment_created);
        assert!(!report.notification_sent);
        assert!(!report.status_failed());
        assert_eq!(report.failures[0].effect, Effect::Notification);
    }

    #[tokio::test]
    async fn test_status_failure_escalates_and_skips_echoes() {
        let mut status = MockStatusUpdater::new();
        status
            .expect_set_status()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let mut comments = MockCommentCreator::new();
        comments.expect_create().never();
        let mut notifications = MockNotificationService::new();
        notifications.expect_notify_moderation_result().never();
        let mut flags = MockFlagCreator::new();
        flags
            .expect_create_flag()
            .withf(|flag| flag.reason == "moderation_failed" && flag.details.contains("connection refused"))
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = SideEffectDispatcher::new(
            Arc::new(status),
            Arc::new(comments),
            Arc::new(notifications),
            Arc::new(flags),
        );

        let report = dispatcher
            .dispatch(&input(), &OutcomePolicy::Approve, &ModerationVerdict::approved("ok"))
            .await;

        assert!(report.status_failed());
        assert!(report.flag_raised);
        assert_eq!(report.status, None);
    }

    #[tokio::test]
    async fn test_draft_failure_escalates_and_skips_comment() {
        let mut status = MockStatusUpdater::new();
        status.expect_set_status().never();
        status
            .expect_set_draft_with_language()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("posts table locked")));
        let mut comments = MockCommentCreator::new();
        comments.expect_create().never();
        let mut flags = MockFlagCreator::new();
        flags
            .expect_create_flag()
            .withf(|flag| {
                flag.details.contains("hold_for_translation") && flag.details.contains("posts table locked")
            })
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = SideEffectDispatcher::new(
            Arc::new(status),
            Arc::new(comments),
            Arc::new(MockNotificationService::new()),
            Arc::new(flags),
        );
        let held = ModerationVerdict::rejected("Not in English", ["LANGUAGE"]).with_language("Portuguese");

        let report = dispatcher
            .dispatch(&input(), &OutcomePolicy::HoldForTranslation("Portuguese".into()), &held)
            .await;

        assert!(report.status_failed());
        assert!(report.flag_raised);
        assert!(!report.comment_created);
        assert_eq!(report.status, None);
    }

    #[tokio::test]
    async fn test_missing_author_is_not_reported_as_notified() {
        let store = Arc::new(RecordingStore::new());
        let mut notifications = MockNotificationService::new();
        notifications.expect_notify_moderation_result().never();
        let dispatcher = SideEffectDispatcher::new(
            store.clone(),
            store.clone(),
            Arc::new(notifications),
            store.clone(),
        );
        let anonymous = ModerationInput::new(Uuid::new_v4(), "t", "b");

        let report = dispatcher
            .dispatch(&anonymous, &OutcomePolicy::Approve, &ModerationVerdict::approved("ok"))
            .await;

        assert!(report.comment_created);
        assert!(!report.notification_sent);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_flag_failure_is_reported() {
        let mut flags = MockFlagCreator::new();
        flags
            .expect_create_flag()
            .returning(|_| Err(anyhow::anyhow!("flags unavailable")));
        let store = Arc::new(RecordingStore::new());
        let dispatcher =
            SideEffectDispatcher::new(store.clone(), store.clone(), store.clone(), Arc::new(flags));

        let report = dispatcher.escalate(Uuid::new_v4(), "gave up").await;

        assert!(!report.flag_raised);
        assert_eq!(report.failures[0].effect, Effect::Flag);
    }

    #[test]
    fn test_comment_templates() {
        assert!(rejection_comment("Off topic").starts_with("Post rejected by Solvr moderation."));
        assert!(translation_comment("Spanish").contains("appears to be in Spanish"));
        assert!(translation_comment("Spanish").contains("translate it to English"));
    }
}
