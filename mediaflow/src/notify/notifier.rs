//! Notifier trait and implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::{ExecutionId, ExecutionStatus, WorkflowExecution};
use crate::utils::{format_iso8601, Timestamp};

/// Payload sent when an execution reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionNotification {
    /// The execution.
    pub execution_id: ExecutionId,
    /// The artifact it processed.
    pub artifact_key: String,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Most recent failure, formatted with stage, attempt and classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the execution reached its terminal status.
    pub finished_at: Timestamp,
}

impl ExecutionNotification {
    /// Builds the notification for an execution.
    #[must_use]
    pub fn from_execution(execution: &WorkflowExecution) -> Self {
        Self {
            execution_id: execution.execution_id(),
            artifact_key: execution.artifact_key().to_string(),
            status: execution.status(),
            last_error: execution.last_error().map(|e| e.to_string()),
            finished_at: execution.updated_at(),
        }
    }
}

/// Receiver of terminal execution notifications.
///
/// Delivery is fire-and-forget for the engine: implementations handle and
/// log their own failures and never report them back.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a notification.
    async fn notify(&self, notification: ExecutionNotification);
}

/// A notifier that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _notification: ExecutionNotification) {}
}

/// A notifier that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: ExecutionNotification) {
        match notification.status {
            ExecutionStatus::Failed => error!(
                execution_id = %notification.execution_id,
                artifact_key = %notification.artifact_key,
                last_error = notification.last_error.as_deref().unwrap_or(""),
                finished_at = %format_iso8601(&notification.finished_at),
                "Execution failed"
            ),
            status => info!(
                execution_id = %notification.execution_id,
                artifact_key = %notification.artifact_key,
                status = %status,
                finished_at = %format_iso8601(&notification.finished_at),
                "Execution finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageResult;
    use crate::errors::{ErrorClassification, ErrorDetail};

    #[test]
    fn test_notification_carries_last_error() {
        let mut exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        exec.record(StageResult::in_flight("transcode", 1).fail_fatal(ErrorDetail::new(
            ErrorClassification::PermanentInputError,
            "unsupported codec",
        )))
        .unwrap();
        exec.finish(ExecutionStatus::Failed).unwrap();

        let notification = ExecutionNotification::from_execution(&exec);
        assert_eq!(notification.status, ExecutionStatus::Failed);
        assert_eq!(notification.finished_at, exec.updated_at());
        let last_error = notification.last_error.unwrap();
        assert!(last_error.contains("transcode"));
        assert!(last_error.contains("PermanentInputError"));
    }

    #[tokio::test]
    async fn test_notifiers_do_not_panic() {
        let exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        let notification = ExecutionNotification::from_execution(&exec);
        NoOpNotifier.notify(notification.clone()).await;
        LoggingNotifier.notify(notification).await;
    }
}
