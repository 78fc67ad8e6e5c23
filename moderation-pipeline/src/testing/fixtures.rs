//! Test fixtures: sample posts and a fully wired pipeline.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{RecordingStore, ScriptedClient};
use crate::core::{AuthorKind, ModerationInput, PostKind};
use crate::errors::ModerationError;
use crate::events::CollectingEventSink;
use crate::pipeline::{ModerationPipeline, ModerationPipelineBuilder, RetryPolicy};

/// A well-formed English question by a human author, with a fresh post id.
#[must_use]
pub fn sample_input() -> ModerationInput {
    ModerationInput::new(
        Uuid::new_v4(),
        "How do I handle async operations in Go?",
        "I'm trying to understand goroutines and channels. When should I use a buffered channel instead of a mutex?",
    )
    .with_tags(["go", "concurrency"])
    .with_post_kind(PostKind::Question)
    .with_author(AuthorKind::Human, "user-123")
}

/// A sample post by an agent author.
#[must_use]
pub fn agent_input(kind: PostKind) -> ModerationInput {
    ModerationInput::new(
        Uuid::new_v4(),
        "Cache invalidation strategies for CDN edges",
        "Comparing TTL-based expiry with explicit purge events across regions.",
    )
    .with_tags(["caching", "cdn"])
    .with_post_kind(kind)
    .with_author(AuthorKind::Agent, "claude_assistant")
}

/// A retry policy with millisecond delays, for tests that sleep for real.
#[must_use]
pub fn fast_policy(retries: usize) -> RetryPolicy {
    RetryPolicy::new(vec![Duration::from_millis(1); retries])
}

/// A pipeline wired to one recording store and a collecting event sink.
pub struct TestPipeline {
    /// The pipeline under test.
    pub pipeline: ModerationPipeline,
    /// The classifier.
    pub client: Arc<ScriptedClient>,
    /// Every collaborator.
    pub store: Arc<RecordingStore>,
    /// Emitted events.
    pub events: Arc<CollectingEventSink>,
}

impl TestPipeline {
    /// Wires `client` with the default retry policy.
    pub fn new(client: ScriptedClient) -> Result<Self, ModerationError> {
        Self::with_policy(client, RetryPolicy::default())
    }

    /// Wires `client` with `policy`.
    pub fn with_policy(client: ScriptedClient, policy: RetryPolicy) -> Result<Self, ModerationError> {
        let client = Arc::new(client);
        let store = Arc::new(RecordingStore::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = wired_builder(client.clone(), &store)
            .with_retry_policy(policy)
            .with_event_sink(events.clone())
            .build()?;
        Ok(Self {
            pipeline,
            client,
            store,
            events,
        })
    }
}

/// A builder with every collaborator pointing at `store`.
#[must_use]
pub fn wired_builder(client: Arc<ScriptedClient>, store: &Arc<RecordingStore>) -> ModerationPipelineBuilder {
    ModerationPipeline::builder()
        .with_client(client)
        .with_status_updater(store.clone())
        .with_comment_creator(store.clone())
        .with_notification_service(store.clone())
        .with_flag_creator(store.clone())
}

impl std::fmt::Debug for TestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestPipeline")
            .field("calls", &self.client.call_count())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}
