//! Span helpers carrying execution and stage attribution.

use tracing::Span;

use crate::core::WorkflowExecution;

/// Span covering work on one execution.
#[must_use]
pub fn execution_span(execution: &WorkflowExecution) -> Span {
    tracing::info_span!(
        "execution",
        execution_id = %execution.execution_id(),
        artifact_key = %execution.artifact_key(),
    )
}

/// Span covering one stage attempt.
#[must_use]
pub fn stage_span(execution: &WorkflowExecution, stage: &str, attempt: u32) -> Span {
    tracing::info_span!(
        "stage",
        execution_id = %execution.execution_id(),
        artifact_key = %execution.artifact_key(),
        stage = %stage,
        attempt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered() {
        let exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        let _outer = execution_span(&exec).entered();
        let _inner = stage_span(&exec, "transcode", 1).entered();
    }
}
