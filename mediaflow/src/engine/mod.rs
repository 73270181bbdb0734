//! The workflow engine.
//!
//! The engine owns the per-execution state machine: it asks the
//! [`StageExecutor`](crate::executor::StageExecutor) to run the current
//! stage, records the result, consults the retry policy and persists the
//! record after every transition.

mod trigger;
mod workflow;

#[cfg(test)]
mod integration_tests;

pub use trigger::TriggerEvent;
pub use workflow::{WorkflowEngine, DEFAULT_MAX_CONCURRENT_EXECUTIONS};
