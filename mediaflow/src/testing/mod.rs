//! Testing utilities for mediaflow engines.
//!
//! This module provides:
//! - A scripted job adapter and a collecting notifier
//! - A harness wiring the default pipeline over in-memory collaborators
//! - Assertions over execution histories

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_attempts, assert_failed_with, assert_stage_history_ordered, assert_succeeded_in_order,
};
pub use fixtures::{
    TestHarness, MEDIA_PREFIX, SAMPLE_SRT, SAMPLE_TEXT, TEXT_PREFIX, TRANSCRIPT_PREFIX,
};
pub use mocks::{CollectingNotifier, ScriptedAttempt, ScriptedJobAdapter};
