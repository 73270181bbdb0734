//! Runs external job and local transform attempts.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::adapters::{JobAdapter, JobHandle, JobStatus};
use crate::cancellation::CancellationToken;
use crate::core::{StageInput, StageKind, StageResult};
use crate::errors::{ConfigurationError, ErrorClassification, ErrorDetail};
use crate::pipeline::{PipelineDefinition, PollSchedule, StageDefinition};
use crate::transform::LocalTransform;
use crate::utils::now_utc;

/// Transient poll call failures tolerated in a row before the attempt fails.
pub const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 5;

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt has an outcome.
    Completed(StageResult),
    /// Cancellation was observed; the result is still in flight and the
    /// provider job is no longer tracked.
    Cancelled(StageResult),
}

impl AttemptOutcome {
    /// Returns the stage result.
    #[must_use]
    pub fn into_result(self) -> StageResult {
        match self {
            Self::Completed(result) | Self::Cancelled(result) => result,
        }
    }

    /// Returns true if cancellation ended the attempt.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Executes stage attempts with the registered adapters and transforms.
#[derive(Clone, Default)]
pub struct StageExecutor {
    adapters: HashMap<String, Arc<dyn JobAdapter>>,
    transforms: HashMap<String, Arc<dyn LocalTransform>>,
    poll: PollSchedule,
}

impl fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adapters: Vec<_> = self.adapters.keys().collect();
        adapters.sort();
        let mut transforms: Vec<_> = self.transforms.keys().collect();
        transforms.sort();
        f.debug_struct("StageExecutor")
            .field("adapters", &adapters)
            .field("transforms", &transforms)
            .field("poll", &self.poll)
            .finish()
    }
}

impl StageExecutor {
    /// Creates an executor with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the job adapter of an external job stage.
    #[must_use]
    pub fn with_adapter(mut self, stage: impl Into<String>, adapter: Arc<dyn JobAdapter>) -> Self {
        self.adapters.insert(stage.into(), adapter);
        self
    }

    /// Registers the transform of a local transform stage.
    #[must_use]
    pub fn with_transform(
        mut self,
        stage: impl Into<String>,
        transform: Arc<dyn LocalTransform>,
    ) -> Self {
        self.transforms.insert(stage.into(), transform);
        self
    }

    /// Sets the poll schedule.
    #[must_use]
    pub fn with_poll_schedule(mut self, poll: PollSchedule) -> Self {
        self.poll = poll;
        self
    }

    /// Returns the poll schedule.
    #[must_use]
    pub fn poll_schedule(&self) -> PollSchedule {
        self.poll
    }

    /// Checks that every stage of the pipeline has its work registered.
    pub fn validate(&self, pipeline: &PipelineDefinition) -> Result<(), ConfigurationError> {
        for stage in pipeline.stages() {
            match stage.kind {
                StageKind::ExternalJob if !self.adapters.contains_key(&stage.name) => {
                    return Err(ConfigurationError::MissingAdapter(stage.name.clone()));
                }
                StageKind::LocalTransform if !self.transforms.contains_key(&stage.name) => {
                    return Err(ConfigurationError::MissingTransform(stage.name.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Runs one attempt from start to outcome.
    pub async fn run(
        &self,
        stage: &StageDefinition,
        input: &StageInput,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let started = self.begin(stage, input, attempt).await;
        if started.is_in_flight() {
            self.complete(stage, input, started, cancel).await
        } else {
            AttemptOutcome::Completed(started)
        }
    }

    /// Starts an attempt.
    ///
    /// For an external job stage this starts the provider job and returns an
    /// in-flight result carrying the provider job id, which the caller
    /// persists before calling [`complete`](Self::complete). A start that
    /// fails returns a completed failure instead.
    pub async fn begin(&self, stage: &StageDefinition, input: &StageInput, attempt: u32) -> StageResult {
        let pending = StageResult::in_flight(&stage.name, attempt);

        match stage.kind {
            StageKind::LocalTransform => pending,
            StageKind::ExternalJob => {
                let Some(adapter) = self.adapters.get(&stage.name) else {
                    return missing(pending, ConfigurationError::MissingAdapter(stage.name.clone()));
                };
                match JobHandle::start(Arc::clone(adapter), input).await {
                    Ok(handle) => {
                        info!(
                            provider = adapter.provider(),
                            provider_job_id = handle.provider_job_id(),
                            input = %input.location,
                            "Started provider job"
                        );
                        pending.with_provider_job(handle.provider_job_id())
                    }
                    Err(e) => {
                        let detail = e.to_detail();
                        warn!(error = %detail, "Provider rejected job start");
                        classify_failure(pending, detail)
                    }
                }
            }
        }
    }

    /// Drives an in-flight attempt to its outcome.
    ///
    /// An external job is reattached from the provider job id on the result,
    /// so this also resumes attempts persisted before a restart.
    pub async fn complete(
        &self,
        stage: &StageDefinition,
        input: &StageInput,
        in_flight: StageResult,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        match stage.kind {
            StageKind::LocalTransform => {
                AttemptOutcome::Completed(self.run_transform(stage, input, in_flight).await)
            }
            StageKind::ExternalJob => {
                let Some(adapter) = self.adapters.get(&stage.name) else {
                    return AttemptOutcome::Completed(missing(
                        in_flight,
                        ConfigurationError::MissingAdapter(stage.name.clone()),
                    ));
                };

                let in_flight = if in_flight.provider_job_id.is_some() {
                    in_flight
                } else {
                    // Started but never persisted with a job id: start again.
                    let restarted = self.begin(stage, input, in_flight.attempt).await;
                    if !restarted.is_in_flight() {
                        return AttemptOutcome::Completed(restarted);
                    }
                    restarted
                };

                let job_id = in_flight.provider_job_id.clone().unwrap_or_default();
                let already_elapsed = (now_utc() - in_flight.started_at)
                    .to_std()
                    .unwrap_or_default();
                let handle = JobHandle::resume(Arc::clone(adapter), job_id, already_elapsed);
                self.poll_job(stage, &handle, in_flight, cancel).await
            }
        }
    }

    async fn run_transform(
        &self,
        stage: &StageDefinition,
        input: &StageInput,
        in_flight: StageResult,
    ) -> StageResult {
        let Some(transform) = self.transforms.get(&stage.name) else {
            return missing(in_flight, ConfigurationError::MissingTransform(stage.name.clone()));
        };

        let applied = AssertUnwindSafe(transform.apply(input)).catch_unwind();
        match tokio::time::timeout(stage.timeout, applied).await {
            Ok(Ok(Ok(output))) => in_flight.succeed(output),
            Ok(Ok(Err(e))) => {
                warn!(transform = transform.name(), error = %e, "Local transform failed");
                in_flight.fail_fatal(ErrorDetail::new(
                    ErrorClassification::PermanentInputError,
                    e.to_string(),
                ))
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(transform = transform.name(), panic = %message, "Local transform panicked");
                in_flight.fail_fatal(ErrorDetail::new(
                    ErrorClassification::PermanentInputError,
                    format!("transform '{}' panicked: {message}", transform.name()),
                ))
            }
            Err(_) => in_flight.fail_retryable(ErrorDetail::new(
                ErrorClassification::Timeout,
                format!("transform '{}' exceeded {:?}", transform.name(), stage.timeout),
            )),
        }
    }

    async fn poll_job(
        &self,
        stage: &StageDefinition,
        handle: &JobHandle,
        in_flight: StageResult,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let mut consecutive_errors = 0;

        loop {
            if cancel.is_cancelled() {
                return cancelled(handle, in_flight);
            }

            let elapsed = handle.elapsed();
            let wait = self
                .poll
                .interval_for(elapsed)
                .min(stage.timeout.saturating_sub(elapsed));
            tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(handle, in_flight),
                () = tokio::time::sleep(wait) => {}
            }

            match handle.status().await {
                Ok(JobStatus::Running) => {
                    consecutive_errors = 0;
                    debug!(
                        provider_job_id = handle.provider_job_id(),
                        elapsed_secs = handle.elapsed().as_secs(),
                        "Job still running"
                    );
                }
                Ok(JobStatus::Succeeded { output_location }) => {
                    info!(
                        provider_job_id = handle.provider_job_id(),
                        output = %output_location,
                        "Provider job succeeded"
                    );
                    return AttemptOutcome::Completed(in_flight.succeed(output_location));
                }
                Ok(JobStatus::Failed { error }) => {
                    let detail = error.to_detail();
                    warn!(provider_job_id = handle.provider_job_id(), error = %detail, "Provider job failed");
                    return AttemptOutcome::Completed(classify_failure(in_flight, detail));
                }
                Err(e) => {
                    let detail = e.to_detail();
                    if !detail.classification.is_retryable() {
                        return AttemptOutcome::Completed(classify_failure(in_flight, detail));
                    }
                    consecutive_errors += 1;
                    warn!(
                        provider_job_id = handle.provider_job_id(),
                        consecutive_errors,
                        error = %detail,
                        "Poll call failed"
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_POLL_ERRORS {
                        return AttemptOutcome::Completed(in_flight.fail_retryable(detail));
                    }
                }
            }

            if handle.elapsed() >= stage.timeout {
                warn!(
                    provider_job_id = handle.provider_job_id(),
                    timeout_secs = stage.timeout.as_secs(),
                    "Stage timed out"
                );
                return AttemptOutcome::Completed(in_flight.fail_retryable(ErrorDetail::new(
                    ErrorClassification::Timeout,
                    format!(
                        "job {} still running after {}",
                        handle.provider_job_id(),
                        format_duration(stage.timeout)
                    ),
                )));
            }
        }
    }
}

fn cancelled(handle: &JobHandle, in_flight: StageResult) -> AttemptOutcome {
    info!(
        provider_job_id = handle.provider_job_id(),
        "Cancellation observed, no longer tracking job"
    );
    AttemptOutcome::Cancelled(in_flight)
}

fn missing(result: StageResult, error: ConfigurationError) -> StageResult {
    result.fail_fatal(ErrorDetail::new(
        ErrorClassification::ConfigurationError,
        error.to_string(),
    ))
}

fn classify_failure(result: StageResult, detail: ErrorDetail) -> StageResult {
    if detail.classification.is_retryable() {
        result.fail_retryable(detail)
    } else {
        result.fail_fatal(detail)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
