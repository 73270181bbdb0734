//! Core domain model types for mediaflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Execution ids, statuses and stage outcomes
//! - Stage inputs and results (one result per attempt)
//! - The workflow execution record and its derived state machine

mod execution;
mod input;
mod result;
mod status;

pub use execution::{ExecutionId, ExecutionState, FailureReport, WorkflowExecution};
pub use input::StageInput;
pub use result::StageResult;
pub use status::{ExecutionStatus, StageKind, StageOutcome};
