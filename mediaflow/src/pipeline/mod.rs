//! Pipeline definitions and policies.
//!
//! This module provides:
//! - Stage and pipeline definitions
//! - The retry policy evaluator
//! - The poll schedule for external jobs

mod definition;
mod poll;
mod retry;

pub use definition::{
    PipelineDefinition, StageDefinition, EXTRACT_TEXT_STAGE, TRANSCODE_STAGE, TRANSCRIBE_STAGE,
};
pub use poll::PollSchedule;
pub use retry::{should_retry, RetryDecision, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
