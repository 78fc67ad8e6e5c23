//! Registry of moderation runs keyed by post id.
//!
//! Guards against two pipelines deciding the same post. A post is claimed
//! when its run is spawned and stays claimed while the run is in flight and
//! for a retention window after it finishes. Cancelled or crashed runs
//! release their claim.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::PipelineState;

/// Default time a finished run keeps its post claimed.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Registry view of one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A pipeline is running for the post.
    InFlight,
    /// A pipeline reached this terminal state.
    Finished(PipelineState),
}

struct RunEntry {
    status: RunStatus,
    updated_at: Instant,
}

impl RunEntry {
    fn in_flight() -> Self {
        Self {
            status: RunStatus::InFlight,
            updated_at: Instant::now(),
        }
    }

    fn is_expired(&self, retention: Duration) -> bool {
        matches!(self.status, RunStatus::Finished(_)) && self.updated_at.elapsed() >= retention
    }
}

/// Concurrent registry of runs.
pub struct RunRegistry {
    runs: DashMap<Uuid, RunEntry>,
    retention: Duration,
}

impl RunRegistry {
    /// Creates a registry that remembers finished runs for `retention`.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            retention,
        }
    }

    /// Claims a post for a new run. Returns false if it is already claimed.
    pub fn claim(&self, post_id: Uuid) -> bool {
        match self.runs.entry(post_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(self.retention) {
                    entry.insert(RunEntry::in_flight());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(RunEntry::in_flight());
                true
            }
        }
    }

    /// Records that the run for `post_id` reached a terminal state.
    pub fn finish(&self, post_id: Uuid, state: PipelineState) {
        self.runs.insert(
            post_id,
            RunEntry {
                status: RunStatus::Finished(state),
                updated_at: Instant::now(),
            },
        );
    }

    /// Drops the claim on `post_id`.
    pub fn release(&self, post_id: Uuid) {
        self.runs.remove(&post_id);
    }

    /// Drops a finished claim so the post can be moderated again.
    ///
    /// Returns false if the post has a run in flight.
    pub fn forget_finished(&self, post_id: Uuid) -> bool {
        self.runs
            .remove_if(&post_id, |_, entry| entry.status != RunStatus::InFlight);
        !self
            .runs
            .get(&post_id)
            .is_some_and(|entry| entry.status == RunStatus::InFlight)
    }

    /// Returns the current status of `post_id`.
    pub fn status(&self, post_id: Uuid) -> Option<RunStatus> {
        self.runs
            .get(&post_id)
            .filter(|entry| !entry.is_expired(self.retention))
            .map(|entry| entry.status)
    }

    /// Number of runs in flight.
    pub fn in_flight(&self) -> usize {
        self.runs
            .iter()
            .filter(|entry| entry.status == RunStatus::InFlight)
            .count()
    }

    /// Removes finished entries past the retention window.
    pub fn prune(&self) {
        let retention = self.retention;
        self.runs.retain(|_, entry| !entry.is_expired(retention));
    }

    /// Number of tracked posts.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl std::fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRegistry")
            .field("tracked", &self.runs.len())
            .field("retention", &self.retention)
            .finish()
    }
}
