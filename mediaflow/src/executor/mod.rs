//! Stage execution.
//!
//! The [`StageExecutor`] runs one attempt of one stage and turns whatever
//! happens into a [`StageResult`](crate::core::StageResult). It never
//! touches the workflow execution record; the engine records the result.

mod runner;

pub use runner::{AttemptOutcome, StageExecutor, MAX_CONSECUTIVE_POLL_ERRORS};
