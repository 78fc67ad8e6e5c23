//! Scripted and recording collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use uuid::Uuid;

use crate::core::{Comment, Flag, ModerationInput, ModerationResultNotice, ModerationVerdict, Notification, PostStatus};
use crate::errors::{ClassifierError, CollaboratorResult};
use crate::notifications::NotificationRepository;
use crate::ports::{CommentCreator, FlagCreator, ModerationClient, NotificationService, StatusUpdater};

type Answer = Result<ModerationVerdict, ClassifierError>;

/// A classifier that replays a script of answers.
///
/// Once the script runs out every call returns the fallback answer.
#[derive(Debug)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Answer>>,
    fallback: Answer,
    latency: Option<Duration>,
    inputs: Mutex<Vec<ModerationInput>>,
}

impl ScriptedClient {
    /// Creates a client replaying `script`, then failing transiently.
    #[must_use]
    pub fn new(script: Vec<Answer>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(ClassifierError::transient("script exhausted")),
            latency: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// A client that approves everything.
    #[must_use]
    pub fn always_approve() -> Self {
        Self::new(Vec::new()).with_fallback(Ok(ModerationVerdict::approved(
            "Content is relevant and appropriate",
        )))
    }

    /// A client that always fails transiently with `message`.
    #[must_use]
    pub fn always_failing(message: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Err(ClassifierError::transient(message)))
    }

    /// Sets the answer returned once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, answer: Answer) -> Self {
        self.fallback = answer;
        self
    }

    /// Makes every call take `latency` before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Inputs received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<ModerationInput> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl ModerationClient for ScriptedClient {
    async fn moderate(&self, input: &ModerationInput) -> Result<ModerationVerdict, ClassifierError> {
        self.inputs.lock().push(input.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    statuses: HashMap<Uuid, PostStatus>,
    languages: HashMap<Uuid, String>,
    status_writes: Vec<(Uuid, PostStatus)>,
    comments: Vec<Comment>,
    notices: Vec<ModerationResultNotice>,
    notifications: Vec<Notification>,
    flags: Vec<Flag>,
}

/// In-memory store implementing every collaborator port.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: Mutex<Recorded>,
}

impl RecordingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of a post, if it was ever written.
    #[must_use]
    pub fn status_of(&self, post_id: Uuid) -> Option<PostStatus> {
        self.inner.lock().statuses.get(&post_id).copied()
    }

    /// Original language recorded for a drafted post.
    #[must_use]
    pub fn language_of(&self, post_id: Uuid) -> Option<String> {
        self.inner.lock().languages.get(&post_id).cloned()
    }

    /// Every status write, in order.
    #[must_use]
    pub fn status_writes(&self) -> Vec<(Uuid, PostStatus)> {
        self.inner.lock().status_writes.clone()
    }

    /// Stored comments.
    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.inner.lock().comments.clone()
    }

    /// Received moderation notices.
    #[must_use]
    pub fn notices(&self) -> Vec<ModerationResultNotice> {
        self.inner.lock().notices.clone()
    }

    /// Stored notifications.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().notifications.clone()
    }

    /// Stored flags.
    #[must_use]
    pub fn flags(&self) -> Vec<Flag> {
        self.inner.lock().flags.clone()
    }

    /// Flags raised against one post.
    #[must_use]
    pub fn flags_for(&self, post_id: Uuid) -> Vec<Flag> {
        self.inner
            .lock()
            .flags
            .iter()
            .filter(|f| f.target_id == post_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StatusUpdater for RecordingStore {
    async fn set_status(&self, post_id: Uuid, status: PostStatus) -> CollaboratorResult<()> {
        let mut inner = self.inner.lock();
        inner.statuses.insert(post_id, status);
        inner.status_writes.push((post_id, status));
        Ok(())
    }

    async fn set_draft_with_language(&self, post_id: Uuid, language: &str) -> CollaboratorResult<()> {
        let mut inner = self.inner.lock();
        inner.statuses.insert(post_id, PostStatus::Draft);
        inner.languages.insert(post_id, language.to_string());
        inner.status_writes.push((post_id, PostStatus::Draft));
        Ok(())
    }
}

#[async_trait]
impl CommentCreator for RecordingStore {
    async fn create(&self, comment: Comment) -> CollaboratorResult<()> {
        self.inner.lock().comments.push(comment);
        Ok(())
    }
}

#[async_trait]
impl NotificationService for RecordingStore {
    async fn notify_moderation_result(&self, notice: ModerationResultNotice) -> CollaboratorResult<()> {
        self.inner.lock().notices.push(notice);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for RecordingStore {
    async fn create(&self, notification: Notification) -> CollaboratorResult<()> {
        self.inner.lock().notifications.push(notification);
        Ok(())
    }
}

#[async_trait]
impl FlagCreator for RecordingStore {
    async fn create_flag(&self, flag: Flag) -> CollaboratorResult<()> {
        self.inner.lock().flags.push(flag);
        Ok(())
    }
}
