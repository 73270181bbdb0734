//! Stage result: the record of one stage attempt.

use serde::{Deserialize, Serialize};

use super::StageOutcome;
use crate::errors::ErrorDetail;
use crate::utils::{now_utc, Timestamp};

/// Record of one attempted stage execution.
///
/// A result is *in flight* while its external job is still being polled:
/// `outcome` and `ended_at` are unset and `provider_job_id` identifies the
/// job so polling can resume after a restart. Once completed, `error_detail`
/// is present iff the outcome is a failure and `output_ref` iff it is a
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: Timestamp,
    /// When the attempt ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// The outcome, unset while in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StageOutcome>,
    /// Structured error for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    /// Location of the produced artifact for successful attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    /// Provider-assigned job id for external job stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,
}

impl StageResult {
    /// Creates an in-flight result for an attempt that just started.
    #[must_use]
    pub fn in_flight(stage_name: impl Into<String>, attempt: u32) -> Self {
        Self {
            stage_name: stage_name.into(),
            attempt,
            started_at: now_utc(),
            ended_at: None,
            outcome: None,
            error_detail: None,
            output_ref: None,
            provider_job_id: None,
        }
    }

    /// Sets the provider job id.
    #[must_use]
    pub fn with_provider_job(mut self, job_id: impl Into<String>) -> Self {
        self.provider_job_id = Some(job_id.into());
        self
    }

    /// Completes the attempt successfully.
    #[must_use]
    pub fn succeed(mut self, output_ref: impl Into<String>) -> Self {
        self.ended_at = Some(now_utc());
        self.outcome = Some(StageOutcome::Success);
        self.output_ref = Some(output_ref.into());
        self.error_detail = None;
        self
    }

    /// Completes the attempt with a retryable failure.
    #[must_use]
    pub fn fail_retryable(self, detail: ErrorDetail) -> Self {
        self.fail(StageOutcome::RetryableFailure, detail)
    }

    /// Completes the attempt with a fatal failure.
    #[must_use]
    pub fn fail_fatal(self, detail: ErrorDetail) -> Self {
        self.fail(StageOutcome::FatalFailure, detail)
    }

    fn fail(mut self, outcome: StageOutcome, detail: ErrorDetail) -> Self {
        self.ended_at = Some(now_utc());
        self.outcome = Some(outcome);
        self.error_detail = Some(detail);
        self.output_ref = None;
        self
    }

    /// Returns true while the attempt has no outcome yet.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.outcome.is_none()
    }

    /// Returns true if the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Some(StageOutcome::Success))
    }

    /// Returns true if the attempt failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome.is_some_and(|o| o.is_failure())
    }

    /// Returns the duration in milliseconds, if the attempt has ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}
