//! Fire-and-forget launcher for moderation runs.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ModerationPipeline, ModerationPipelineBuilder, RunRegistry};
use crate::cancellation::CancellationToken;
use crate::config::SpawnerConfig;
use crate::core::ModerationInput;
use crate::errors::ModerationError;

/// Result of asking the spawner to moderate a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnOutcome {
    /// A run was started in the background.
    Spawned,
    /// The post already has a run in flight or recently finished.
    Duplicate,
    /// The spawner is shutting down.
    ShuttingDown,
}

/// What happened to in-flight runs during shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Runs that stopped within the grace period.
    pub completed: usize,
    /// Runs still going when the grace period ran out.
    pub aborted: usize,
    /// Runs that panicked.
    pub panicked: usize,
}

/// Releases the registry claim unless the run settled normally.
///
/// Covers panics and aborted tasks.
struct ClaimGuard {
    registry: Arc<RunRegistry>,
    post_id: Uuid,
    settled: bool,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.release(self.post_id);
        }
    }
}

/// Launches one detached pipeline task per post.
///
/// `spawn` never waits for the run. The spawner owns the cancellation token
/// handed to its pipeline, so `shutdown` interrupts every run at its next
/// backoff sleep.
pub struct ModerationSpawner {
    pipeline: ModerationPipeline,
    registry: Arc<RunRegistry>,
    cancel_token: Arc<CancellationToken>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ModerationSpawner {
    /// Creates a spawner from a pipeline builder.
    ///
    /// Any cancellation token already set on the builder is replaced.
    pub fn new(builder: ModerationPipelineBuilder) -> Result<Self, ModerationError> {
        Self::with_registry(builder, Arc::new(RunRegistry::default()))
    }

    /// Creates a spawner whose registry retention comes from `config`.
    pub fn from_config(
        builder: ModerationPipelineBuilder,
        config: &SpawnerConfig,
    ) -> Result<Self, ModerationError> {
        Self::with_registry(builder, Arc::new(RunRegistry::new(config.retention())))
    }

    /// Creates a spawner sharing an existing run registry.
    pub fn with_registry(
        builder: ModerationPipelineBuilder,
        registry: Arc<RunRegistry>,
    ) -> Result<Self, ModerationError> {
        let cancel_token = Arc::new(CancellationToken::new());
        let pipeline = builder.with_cancel_token(cancel_token.clone()).build()?;
        Ok(Self {
            pipeline,
            registry,
            cancel_token,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// The pipeline each run uses.
    #[must_use]
    pub fn pipeline(&self) -> &ModerationPipeline {
        &self.pipeline
    }

    /// The run registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Starts moderating `input` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, input: ModerationInput) -> SpawnOutcome {
        let post_id = input.post_id();

        if self.cancel_token.is_cancelled() {
            warn!(post_id = %post_id, "Spawner shutting down, moderation not started");
            return SpawnOutcome::ShuttingDown;
        }

        self.registry.prune();
        if !self.registry.claim(post_id) {
            info!(post_id = %post_id, "Moderation already claimed, skipping duplicate");
            return SpawnOutcome::Duplicate;
        }

        let pipeline = self.pipeline.clone();
        let mut guard = ClaimGuard {
            registry: self.registry.clone(),
            post_id,
            settled: false,
        };
        let handle = tokio::spawn(async move {
            let report = pipeline.run(input).await;
            if !report.is_cancelled() {
                guard.registry.finish(post_id, report.state);
                guard.settled = true;
            }
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);

        SpawnOutcome::Spawned
    }

    /// Starts moderating an edited post again.
    ///
    /// Drops the claim left by a finished run first. A run still in flight
    /// for the post makes this a duplicate.
    pub fn resubmit(&self, input: ModerationInput) -> SpawnOutcome {
        if !self.registry.forget_finished(input.post_id()) {
            info!(post_id = %input.post_id(), "Moderation in flight, resubmission skipped");
            return SpawnOutcome::Duplicate;
        }
        self.spawn(input)
    }

    /// Number of runs in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.in_flight()
    }

    /// Waits for every spawned run to finish without cancelling anything.
    ///
    /// Returns the first task failure after all tasks have been joined.
    pub async fn drain(&self) -> Result<(), ModerationError> {
        let handles = std::mem::take(&mut *self.handles.lock());
        let mut first_error = None;
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Moderation task failed");
                first_error.get_or_insert_with(|| ModerationError::Task(e.to_string()));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Cancels every run, then waits up to `grace` for them to stop.
    ///
    /// Runs still going after `grace` are aborted; their posts keep the
    /// pending status and lose their registry claim.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.cancel_token.cancel("shutdown");
        let mut handles = std::mem::take(&mut *self.handles.lock());
        info!(
            tasks = handles.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "Shutting down moderation spawner"
        );

        let mut report = ShutdownReport::default();
        let drained = tokio::time::timeout(grace, join_all(handles.iter_mut())).await;
        match drained {
            Ok(results) => {
                for result in results {
                    match result {
                        Ok(()) => report.completed += 1,
                        Err(e) => {
                            error!(error = %e, "Moderation task failed during shutdown");
                            report.panicked += 1;
                        }
                    }
                }
            }
            Err(_) => {
                let mut aborted = Vec::new();
                for handle in handles {
                    if handle.is_finished() {
                        report.completed += 1;
                    } else {
                        handle.abort();
                        aborted.push(handle);
                    }
                }
                report.aborted = aborted.len();
                // Aborted tasks drop their claims once they are reaped.
                join_all(aborted).await;
                warn!(aborted = report.aborted, "Moderation runs aborted after grace period");
            }
        }
        report
    }

    /// Returns true once shutdown has started.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl std::fmt::Debug for ModerationSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationSpawner")
            .field("in_flight", &self.in_flight())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ModerationVerdict, PipelineState, PostStatus};
    use crate::pipeline::{RetryPolicy, RunStatus};
    use crate::testing::{sample_input, RecordingStore, ScriptedClient};

    fn spawner(client: ScriptedClient, store: &Arc<RecordingStore>) -> ModerationSpawner {
        ModerationSpawner::new(
            ModerationPipeline::builder()
                .with_client(Arc::new(client))
                .with_status_updater(store.clone())
                .with_comment_creator(store.clone())
                .with_notification_service(store.clone())
                .with_flag_creator(store.clone()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_propagates_build_errors() {
        let err = ModerationSpawner::new(ModerationPipeline::builder()).unwrap_err();
        assert!(matches!(err, ModerationError::MissingCollaborator(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_uses_configured_retention() {
        let store = Arc::new(RecordingStore::new());
        let client = Arc::new(ScriptedClient::always_approve());
        let config = SpawnerConfig {
            retention_seconds: 60,
            ..SpawnerConfig::default()
        };
        let spawner = ModerationSpawner::from_config(
            ModerationPipeline::builder()
                .with_client(client.clone())
                .with_status_updater(store.clone()),
            &config,
        )
        .unwrap();
        let input = sample_input();

        spawner.spawn(input.clone());
        spawner.drain().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Duplicate);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(spawner.spawn(input), SpawnOutcome::Spawned);
        spawner.drain().await.unwrap();
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_spawn_runs_in_background() {
        let store = Arc::new(RecordingStore::new());
        let spawner = spawner(ScriptedClient::always_approve(), &store);
        let input = sample_input();

        assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Spawned);
        spawner.drain().await.unwrap();

        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
        assert_eq!(
            spawner.registry().status(input.post_id()),
            Some(RunStatus::Finished(PipelineState::Approved))
        );
        assert_eq!(spawner.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_does_not_wait_for_run() {
        let store = Arc::new(RecordingStore::new());
        let client = ScriptedClient::always_approve().with_latency(Duration::from_secs(5));
        let spawner = spawner(client, &store);
        let input = sample_input();

        assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Spawned);
        assert_eq!(spawner.in_flight(), 1);
        assert_eq!(store.status_of(input.post_id()), None);

        spawner.drain().await.unwrap();
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
    }

    #[tokio::test]
    async fn test_duplicate_spawn_is_refused() {
        let store = Arc::new(RecordingStore::new());
        let client = Arc::new(ScriptedClient::always_approve());
        let spawner = ModerationSpawner::new(
            ModerationPipeline::builder()
                .with_client(client.clone())
                .with_status_updater(store.clone()),
        )
        .unwrap();
        let input = sample_input();

        assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Spawned);
        assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Duplicate);
        spawner.drain().await.unwrap();
        assert_eq!(spawner.spawn(input), SpawnOutcome::Duplicate);

        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resubmit_after_finish() {
        let store = Arc::new(RecordingStore::new());
        let client = ScriptedClient::new(vec![
            Ok(ModerationVerdict::rejected("Off topic", ["RELEVANCE"])),
            Ok(ModerationVerdict::approved("Now relevant")),
        ]);
        let spawner = spawner(client, &store);
        let input = sample_input();

        spawner.spawn(input.clone());
        spawner.drain().await.unwrap();
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Rejected));

        assert_eq!(spawner.resubmit(input.clone()), SpawnOutcome::Spawned);
        spawner.drain().await.unwrap();
        assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_while_in_flight_is_duplicate() {
        let store = Arc::new(RecordingStore::new());
        let client = ScriptedClient::always_approve().with_latency(Duration::from_secs(5));
        let spawner = spawner(client, &store);
        let input = sample_input();

        spawner.spawn(input.clone());
        assert_eq!(spawner.resubmit(input), SpawnOutcome::Duplicate);
        spawner.drain().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_backoff_and_releases_claim() {
        let store = Arc::new(RecordingStore::new());
        let spawner = spawner(ScriptedClient::always_failing("timeout"), &store);
        let input = sample_input();

        spawner.spawn(input.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let report = spawner.shutdown(Duration::from_secs(1)).await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.aborted, 0);
        assert!(store.flags().is_empty());
        assert_eq!(store.status_of(input.post_id()), None);
        assert_eq!(spawner.registry().status(input.post_id()), None);
        assert_eq!(spawner.spawn(input), SpawnOutcome::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_after_grace() {
        let store = Arc::new(RecordingStore::new());
        // Stuck inside a classifier call, not a backoff sleep.
        let client = ScriptedClient::always_approve().with_latency(Duration::from_secs(60));
        let spawner = spawner(client, &store);
        let input = sample_input();

        spawner.spawn(input.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let report = spawner.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report.aborted, 1);
        assert_eq!(spawner.registry().status(input.post_id()), None);
        assert_eq!(store.status_of(input.post_id()), None);
    }

    #[tokio::test]
    async fn test_many_posts_run_concurrently() {
        let store = Arc::new(RecordingStore::new());
        let spawner = ModerationSpawner::new(
            ModerationPipeline::builder()
                .with_client(Arc::new(ScriptedClient::always_approve()))
                .with_status_updater(store.clone())
                .with_retry_policy(RetryPolicy::no_retry()),
        )
        .unwrap();

        let inputs: Vec<_> = (0..20).map(|_| sample_input()).collect();
        for input in &inputs {
            assert_eq!(spawner.spawn(input.clone()), SpawnOutcome::Spawned);
        }
        spawner.drain().await.unwrap();

        for input in &inputs {
            assert_eq!(store.status_of(input.post_id()), Some(PostStatus::Open));
        }
    }
}
