//! Testing utilities for moderation pipelines.
//!
//! This module provides:
//! - A scripted classifier and an in-memory store for every collaborator
//! - Sample inputs and a fully wired test pipeline
//! - Assertions over reports and recorded side effects

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_decided, assert_escalated_once, assert_untouched};
pub use fixtures::{agent_input, fast_policy, sample_input, wired_builder, TestPipeline};
pub use mocks::{RecordingStore, ScriptedClient};
