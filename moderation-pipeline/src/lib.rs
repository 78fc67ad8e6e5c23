//! # Moderation Pipeline
//!
//! Asynchronous content moderation for newly created posts.
//!
//! After a post is created it sits in `pending_review` while a detached task
//! asks an external classifier whether it may be published. The pipeline:
//!
//! - **Retries**: transient classifier failures are retried on a fixed
//!   backoff schedule; rate limits are honored without spending the budget
//! - **Decides**: approve, reject, or hold a non-English post for translation
//! - **Dispatches**: writes the status, leaves a system comment and notifies
//!   the author
//! - **Escalates**: if the classifier never answers, raises a flag for
//!   human moderators instead of guessing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use moderation_pipeline::prelude::*;
//!
//! let spawner = ModerationSpawner::new(
//!     ModerationPipeline::builder()
//!         .with_client(classifier)
//!         .with_status_updater(posts.clone())
//!         .with_comment_creator(comments)
//!         .with_notification_service(notifier)
//!         .with_flag_creator(flags),
//! )?;
//!
//! // Returns immediately; the post is moderated in the background.
//! spawner.spawn(ModerationInput::new(post_id, title, body));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod clients;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod notifications;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    #[cfg(feature = "groq")]
    pub use crate::clients::GroqModerationClient;
    pub use crate::config::{GroqConfig, LogConfig, ModerationConfig, RetryConfig, SpawnerConfig};
    pub use crate::core::{
        AuthorKind, Comment, Flag, ModerationInput, ModerationResultNotice, ModerationVerdict,
        Notification, PipelineState, PostKind, PostStatus,
    };
    pub use crate::errors::{ClassifierError, CollaboratorResult, ConfigError, ModerationError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::notifications::{ModerationNotifier, NotificationRepository};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        classify, ModerationPipeline, ModerationPipelineBuilder, ModerationSpawner, OutcomePolicy,
        PipelineReport, RetryPolicy, RunOutcome, SpawnOutcome,
    };
    pub use crate::ports::{
        CommentCreator, FlagCreator, ModerationClient, NotificationService, StatusUpdater,
    };
}
