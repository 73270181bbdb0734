//! Execution status, stage outcome and stage kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Delegates to an external long-running job provider (transcode, transcribe).
    ExternalJob,
    /// Runs a synchronous, local transform (text extraction).
    LocalTransform,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalJob => write!(f, "external_job"),
            Self::LocalTransform => write!(f, "local_transform"),
        }
    }
}

/// The status of a workflow execution.
///
/// Transitions only forward: `Running` to one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// The execution is still advancing through its stages.
    #[default]
    Running,
    /// Every stage succeeded.
    Succeeded,
    /// A stage failed fatally or exhausted its attempts.
    Failed,
    /// Cancellation was requested and observed.
    Cancelled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl ExecutionStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 4] = [Self::Running, Self::Succeeded, Self::Failed, Self::Cancelled];

    /// Returns true if the status can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(self, Self::Running) && next.is_terminal()
    }
}

/// The outcome of one completed stage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageOutcome {
    /// The stage produced its output.
    Success,
    /// The attempt failed but retrying may succeed.
    RetryableFailure,
    /// The attempt failed and retrying cannot help.
    FatalFailure,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::RetryableFailure => write!(f, "RetryableFailure"),
            Self::FatalFailure => write!(f, "FatalFailure"),
        }
    }
}

impl StageOutcome {
    /// Returns true if the outcome is a failure of either kind.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success)
    }
}
