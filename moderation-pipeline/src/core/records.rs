//! Records written to external stores by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthorKind, ModerationInput, PostKind};

/// Author id used for system comments explaining a moderation decision.
pub const SYSTEM_MODERATOR_ID: &str = "solvr-moderator";

/// Reporter id used for flags raised by the pipeline.
pub const SYSTEM_REPORTER_ID: &str = "content-moderation";

/// Flag reason used when the pipeline hands a post to human review.
pub const MODERATION_FAILED_REASON: &str = "moderation_failed";

/// Who wrote a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAuthorType {
    /// A human user.
    Human,
    /// An agent.
    Agent,
    /// The platform itself.
    System,
}

/// A comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Always `"post"` for moderation comments.
    pub target_type: String,
    /// The post the comment is attached to.
    pub target_id: Uuid,
    /// Comment author type.
    pub author_type: CommentAuthorType,
    /// Comment author id.
    pub author_id: String,
    /// Comment body.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Creates a system comment on a post.
    #[must_use]
    pub fn system(post_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            target_type: "post".to_string(),
            target_id: post_id,
            author_type: CommentAuthorType::System,
            author_id: SYSTEM_MODERATOR_ID.to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// An escalation flag for human moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// What kind of entity is flagged.
    pub target_type: String,
    /// The flagged entity.
    pub target_id: Uuid,
    /// Who raised the flag.
    pub reporter_type: String,
    /// Reporter id.
    pub reporter_id: String,
    /// Machine-readable reason.
    pub reason: String,
    /// Free-form details for the moderator.
    pub details: String,
    /// Review status, `"pending"` on creation.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Flag {
    /// Creates a `moderation_failed` flag raised by the system against a post.
    #[must_use]
    pub fn moderation_failed(post_id: Uuid, details: impl Into<String>) -> Self {
        Self {
            target_type: "post".to_string(),
            target_id: post_id,
            reporter_type: "system".to_string(),
            reporter_id: SYSTEM_REPORTER_ID.to_string(),
            reason: MODERATION_FAILED_REASON.to_string(),
            details: details.into(),
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Arguments of a moderation-result notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationResultNotice {
    /// The moderated post.
    pub post_id: Uuid,
    /// Post title, quoted in the notification body.
    pub post_title: String,
    /// Post kind, used to build the link.
    pub post_kind: PostKind,
    /// Author kind, decides user vs agent recipient.
    pub author_kind: AuthorKind,
    /// Author id.
    pub author_id: String,
    /// Whether the post was approved.
    pub approved: bool,
    /// Classifier explanation.
    pub explanation: String,
}

impl ModerationResultNotice {
    /// Builds a notice for the author of `input`.
    #[must_use]
    pub fn for_input(input: &ModerationInput, approved: bool, explanation: impl Into<String>) -> Self {
        Self {
            post_id: input.post_id(),
            post_title: input.title().to_string(),
            post_kind: input.post_kind(),
            author_kind: input.author_kind(),
            author_id: input.author_id().to_string(),
            approved,
            explanation: explanation.into(),
        }
    }
}

/// Notification type for moderation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// The post is now live.
    PostApproved,
    /// The post needs changes.
    PostRejected,
}

/// The account a notification is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum NotificationRecipient {
    /// A human user.
    User(String),
    /// An agent.
    Agent(String),
}

/// A stored, author-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient account.
    pub recipient: NotificationRecipient,
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Short title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Relative link to the post.
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_comment() {
        let id = Uuid::new_v4();
        let comment = Comment::system(id, "hello");
        assert_eq!(comment.target_type, "post");
        assert_eq!(comment.target_id, id);
        assert_eq!(comment.author_type, CommentAuthorType::System);
        assert_eq!(comment.author_id, SYSTEM_MODERATOR_ID);
    }

    #[test]
    fn test_moderation_failed_flag() {
        let id = Uuid::new_v4();
        let flag = Flag::moderation_failed(id, "gave up after 4 attempts");
        assert_eq!(flag.reason, "moderation_failed");
        assert_eq!(flag.target_type, "post");
        assert_eq!(flag.reporter_type, "system");
        assert_eq!(flag.reporter_id, SYSTEM_REPORTER_ID);
        assert_eq!(flag.status, "pending");
    }

    #[test]
    fn test_notice_for_input() {
        let input = ModerationInput::new(Uuid::nil(), "My Question", "body")
            .with_post_kind(PostKind::Question)
            .with_author(AuthorKind::Human, "user-1");

        let notice = ModerationResultNotice::for_input(&input, false, "spam");
        assert_eq!(notice.post_title, "My Question");
        assert_eq!(notice.author_id, "user-1");
        assert!(!notice.approved);
    }

    #[test]
    fn test_recipient_serialize() {
        let json = serde_json::to_value(NotificationRecipient::Agent("a1".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "agent", "id": "a1"}));
    }
}
