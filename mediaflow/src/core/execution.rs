//! The workflow execution record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{ExecutionStatus, StageOutcome, StageResult};
use crate::errors::{ErrorDetail, MediaflowError};
use crate::utils::{generate_uuid_v7, now_utc, Timestamp};

/// Opaque, time-ordered identifier of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a new id.
    #[must_use]
    pub fn new() -> Self {
        Self(generate_uuid_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Position of an execution in the engine's state machine.
///
/// Derived from the persisted record; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Stage `i` has not been attempted yet.
    Pending(usize),
    /// Stage `stage_index` is on attempt `attempt`: either its job is in
    /// flight or the attempt is waiting for its retry delay.
    WaitingOnStage {
        /// Index into the stage definitions.
        stage_index: usize,
        /// The attempt being waited on.
        attempt: u32,
    },
    /// Every stage succeeded.
    Succeeded,
    /// The execution failed.
    Failed,
    /// The execution was cancelled.
    Cancelled,
}

impl ExecutionState {
    /// Returns true for the three terminal states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// The most recent failure of an execution, with its full attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// The stage that failed.
    pub stage_name: String,
    /// The attempt that failed.
    pub attempt: u32,
    /// Retryable or fatal.
    pub outcome: StageOutcome,
    /// Classification and message.
    pub detail: ErrorDetail,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage '{}' attempt {} ({}): {}",
            self.stage_name, self.attempt, self.outcome, self.detail
        )
    }
}

/// One run of the full stage sequence for one artifact.
///
/// Mutated only by the workflow engine. `status` moves forward only and a
/// terminal record is never changed again; `stages` is append-only except
/// that an in-flight attempt is replaced by its own completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    execution_id: ExecutionId,
    artifact_key: String,
    source_location: String,
    stages: Vec<StageResult>,
    status: ExecutionStatus,
    current_stage_index: usize,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancel_reason: Option<String>,
    #[serde(default)]
    version: u64,
}

impl WorkflowExecution {
    /// Creates a new running execution for an artifact.
    #[must_use]
    pub fn new(artifact_key: impl Into<String>, source_location: impl Into<String>) -> Self {
        let now = now_utc();
        Self {
            execution_id: ExecutionId::new(),
            artifact_key: artifact_key.into(),
            source_location: source_location.into(),
            stages: Vec::new(),
            status: ExecutionStatus::Running,
            current_stage_index: 0,
            created_at: now,
            updated_at: now,
            cancel_reason: None,
            version: 0,
        }
    }

    /// Returns the execution id.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Returns the artifact key shared by all stage outputs.
    #[must_use]
    pub fn artifact_key(&self) -> &str {
        &self.artifact_key
    }

    /// Returns the raw input location the execution was triggered with.
    #[must_use]
    pub fn source_location(&self) -> &str {
        &self.source_location
    }

    /// Returns the ordered stage results.
    #[must_use]
    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    /// Returns the execution status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns the index of the stage currently being worked on.
    #[must_use]
    pub fn current_stage_index(&self) -> usize {
        self.current_stage_index
    }

    /// Returns when the execution was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns when the execution was last mutated.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the cancellation reason, if cancelled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Returns the optimistic concurrency version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Records a successful save. Called by store implementations only.
    pub fn mark_saved(&mut self, version: u64) {
        self.version = version;
    }

    /// Returns true if the execution can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the in-flight attempt, if the last result has no outcome yet.
    #[must_use]
    pub fn in_flight(&self) -> Option<&StageResult> {
        self.stages.last().filter(|r| r.is_in_flight())
    }

    /// Returns the last recorded result for a stage.
    #[must_use]
    pub fn last_result_for(&self, stage_name: &str) -> Option<&StageResult> {
        self.stages.iter().rev().find(|r| r.stage_name == stage_name)
    }

    /// Returns the number of attempts recorded for a stage.
    #[must_use]
    pub fn attempts_for(&self, stage_name: &str) -> u32 {
        let count = self.stages.iter().filter(|r| r.stage_name == stage_name).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Returns the output of the successful attempt of a stage.
    #[must_use]
    pub fn output_of(&self, stage_name: &str) -> Option<&str> {
        self.stages
            .iter()
            .find(|r| r.stage_name == stage_name && r.is_success())
            .and_then(|r| r.output_ref.as_deref())
    }

    /// Returns the most recent failure with stage name, attempt and classification.
    #[must_use]
    pub fn last_error(&self) -> Option<FailureReport> {
        self.stages.iter().rev().find_map(|r| match (&r.outcome, &r.error_detail) {
            (Some(outcome), Some(detail)) if outcome.is_failure() => Some(FailureReport {
                stage_name: r.stage_name.clone(),
                attempt: r.attempt,
                outcome: *outcome,
                detail: detail.clone(),
            }),
            _ => None,
        })
    }

    /// Derives the state machine position for a pipeline of `stage_count` stages.
    #[must_use]
    pub fn state(&self, stage_count: usize, current_stage_name: Option<&str>) -> ExecutionState {
        match self.status {
            ExecutionStatus::Succeeded => return ExecutionState::Succeeded,
            ExecutionStatus::Failed => return ExecutionState::Failed,
            ExecutionStatus::Cancelled => return ExecutionState::Cancelled,
            ExecutionStatus::Running => {}
        }

        let index = self.current_stage_index.min(stage_count.saturating_sub(1));
        let Some(name) = current_stage_name else {
            return ExecutionState::Pending(index);
        };

        match self.last_result_for(name) {
            None => ExecutionState::Pending(index),
            Some(r) if r.is_in_flight() => ExecutionState::WaitingOnStage {
                stage_index: index,
                attempt: r.attempt,
            },
            Some(r) => ExecutionState::WaitingOnStage {
                stage_index: index,
                attempt: r.attempt + 1,
            },
        }
    }

    /// Records a stage result.
    ///
    /// An in-flight attempt is replaced by a result for the same stage and
    /// attempt; any other result is appended and must be the next attempt of
    /// its stage.
    pub(crate) fn record(&mut self, result: StageResult) -> Result<(), MediaflowError> {
        self.ensure_running()?;

        if let Some(last) = self.stages.last_mut() {
            if last.is_in_flight() {
                if last.stage_name != result.stage_name || last.attempt != result.attempt {
                    return Err(MediaflowError::Internal(format!(
                        "execution {} has attempt {} of '{}' in flight, cannot record attempt {} of '{}'",
                        self.execution_id, last.attempt, last.stage_name, result.attempt, result.stage_name
                    )));
                }
                *last = result;
                self.touch();
                return Ok(());
            }
        }

        let expected = self.attempts_for(&result.stage_name) + 1;
        if result.attempt != expected {
            return Err(MediaflowError::Internal(format!(
                "stage '{}' expected attempt {}, got {}",
                result.stage_name, expected, result.attempt
            )));
        }
        if self.output_of(&result.stage_name).is_some() {
            return Err(MediaflowError::Internal(format!(
                "stage '{}' already succeeded in execution {}",
                result.stage_name, self.execution_id
            )));
        }

        self.stages.push(result);
        self.touch();
        Ok(())
    }

    /// Moves to the next stage.
    pub(crate) fn advance_stage(&mut self) -> Result<(), MediaflowError> {
        self.ensure_running()?;
        self.current_stage_index += 1;
        self.touch();
        Ok(())
    }

    /// Moves to a terminal status.
    pub(crate) fn finish(&mut self, status: ExecutionStatus) -> Result<(), MediaflowError> {
        if !self.status.can_transition_to(status) {
            return Err(MediaflowError::Internal(format!(
                "illegal status transition {} -> {} for execution {}",
                self.status, status, self.execution_id
            )));
        }
        self.status = status;
        self.touch();
        Ok(())
    }

    /// Moves to `Cancelled`, keeping the reason.
    pub(crate) fn cancel(&mut self, reason: impl Into<String>) -> Result<(), MediaflowError> {
        self.finish(ExecutionStatus::Cancelled)?;
        self.cancel_reason = Some(reason.into());
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), MediaflowError> {
        if self.is_terminal() {
            return Err(MediaflowError::Internal(format!(
                "execution {} is terminal ({})",
                self.execution_id, self.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = now_utc().max(self.updated_at);
    }
}
