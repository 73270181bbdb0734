//! Assertions over execution histories.

use std::collections::HashMap;

use crate::core::{ExecutionStatus, StageOutcome, WorkflowExecution};
use crate::errors::ErrorClassification;
use crate::pipeline::PipelineDefinition;

/// Asserts that attempts of every stage are numbered 1, 2, 3, ... in order.
pub fn assert_stage_history_ordered(execution: &WorkflowExecution) {
    let mut last: HashMap<&str, u32> = HashMap::new();
    for result in execution.stages() {
        let previous = last.insert(result.stage_name.as_str(), result.attempt).unwrap_or(0);
        assert_eq!(
            result.attempt,
            previous + 1,
            "Stage '{}' recorded attempt {} after attempt {}",
            result.stage_name,
            result.attempt,
            previous
        );
    }
}

/// Asserts that the execution succeeded with exactly one success per stage,
/// in definition order.
pub fn assert_succeeded_in_order(execution: &WorkflowExecution, pipeline: &PipelineDefinition) {
    assert_eq!(
        execution.status(),
        ExecutionStatus::Succeeded,
        "Expected success, last error: {:?}",
        execution.last_error()
    );

    let successes: Vec<&str> = execution
        .stages()
        .iter()
        .filter(|r| r.is_success())
        .map(|r| r.stage_name.as_str())
        .collect();
    let expected: Vec<&str> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(successes, expected, "Successful stages out of order");
}

/// Asserts the outcomes recorded for one stage, in attempt order.
pub fn assert_attempts(execution: &WorkflowExecution, stage: &str, expected: &[StageOutcome]) {
    let outcomes: Vec<Option<StageOutcome>> = execution
        .stages()
        .iter()
        .filter(|r| r.stage_name == stage)
        .map(|r| r.outcome)
        .collect();
    let expected: Vec<Option<StageOutcome>> = expected.iter().copied().map(Some).collect();
    assert_eq!(outcomes, expected, "Unexpected attempts for stage '{stage}'");
}

/// Asserts that the execution failed in `stage` with `classification`.
pub fn assert_failed_with(
    execution: &WorkflowExecution,
    stage: &str,
    classification: ErrorClassification,
) {
    assert_eq!(execution.status(), ExecutionStatus::Failed);
    let report = execution
        .last_error()
        .unwrap_or_else(|| panic!("Failed execution {} has no error", execution.execution_id()));
    assert_eq!(report.stage_name, stage, "Failure attributed to the wrong stage");
    assert_eq!(report.detail.classification, classification);
}
