//! Workflow engine implementation.

use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use super::TriggerEvent;
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    ExecutionId, ExecutionState, ExecutionStatus, StageInput, StageOutcome, StageResult,
    WorkflowExecution,
};
use crate::errors::{ConfigurationError, ErrorClassification, MediaflowError, StoreError};
use crate::executor::{AttemptOutcome, StageExecutor};
use crate::notify::{ExecutionNotification, LoggingNotifier, Notifier};
use crate::observability::{execution_span, stage_span};
use crate::pipeline::{should_retry, PipelineDefinition, RetryDecision, StageDefinition};
use crate::store::ExecutionStore;
use crate::utils::now_utc;

/// Default limit of concurrently spawned executions.
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 4;

/// Marks an execution as owned by the current task until dropped.
struct Claim {
    owners: Arc<DashSet<ExecutionId>>,
    id: ExecutionId,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.owners.remove(&self.id);
    }
}

/// Drives workflow executions through the pipeline.
///
/// Cloning is cheap; clones share the store, the cancellation registry and
/// the concurrency limit.
#[derive(Clone)]
pub struct WorkflowEngine {
    pipeline: Arc<PipelineDefinition>,
    executor: Arc<StageExecutor>,
    store: Arc<dyn ExecutionStore>,
    notifier: Arc<dyn Notifier>,
    tokens: Arc<DashMap<ExecutionId, Arc<CancellationToken>>>,
    owners: Arc<DashSet<ExecutionId>>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("stages", &self.pipeline.len())
            .field("executor", &self.executor)
            .field("max_concurrent", &self.max_concurrent)
            .field("active", &self.owners.len())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Creates an engine, checking that every stage has its work registered.
    pub fn new(
        pipeline: Arc<PipelineDefinition>,
        executor: StageExecutor,
        store: Arc<dyn ExecutionStore>,
    ) -> Result<Self, ConfigurationError> {
        executor.validate(&pipeline)?;
        Ok(Self {
            pipeline,
            executor: Arc::new(executor),
            store,
            notifier: Arc::new(LoggingNotifier),
            tokens: Arc::new(DashMap::new()),
            owners: Arc::new(DashSet::new()),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_EXECUTIONS)),
            max_concurrent: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        })
    }

    /// Creates an engine from a configuration document.
    pub fn from_config(
        config: &PipelineConfig,
        executor: StageExecutor,
        store: Arc<dyn ExecutionStore>,
    ) -> Result<Self, ConfigurationError> {
        config.engine.validate()?;
        let pipeline = Arc::new(config.pipeline()?);
        let executor = executor.with_poll_schedule(config.engine.poll.schedule());
        Ok(Self::new(pipeline, executor, store)?
            .with_max_concurrent_executions(config.engine.max_concurrent_executions))
    }

    /// Sets the notifier invoked on terminal states.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets how many spawned executions may run at once.
    #[must_use]
    pub fn with_max_concurrent_executions(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.permits = Arc::new(Semaphore::new(limit));
        self.max_concurrent = limit;
        self
    }

    /// Returns the pipeline definition.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    /// Returns the execution store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Creates and persists a new execution for a trigger.
    ///
    /// Triggers are not deduplicated: every call creates a new execution.
    pub async fn start(&self, trigger: TriggerEvent) -> Result<ExecutionId, MediaflowError> {
        let mut execution = WorkflowExecution::new(trigger.artifact_key, trigger.raw_input_location);
        self.store.save(&mut execution).await?;

        info!(
            execution_id = %execution.execution_id(),
            artifact_key = %execution.artifact_key(),
            source = %execution.source_location(),
            "Execution started"
        );
        Ok(execution.execution_id())
    }

    /// Loads an execution.
    pub async fn load(&self, id: ExecutionId) -> Result<WorkflowExecution, MediaflowError> {
        self.store.load(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => MediaflowError::UnknownExecution(id),
            other => other.into(),
        })
    }

    /// Returns the derived state machine position of an execution.
    pub async fn state(&self, id: ExecutionId) -> Result<ExecutionState, MediaflowError> {
        let execution = self.load(id).await?;
        let stage = self
            .pipeline
            .get(execution.current_stage_index())
            .map(|s| s.name.as_str());
        Ok(execution.state(self.pipeline.len(), stage))
    }

    /// Performs one step: runs one attempt of the current stage and records it.
    ///
    /// A terminal execution, or one another task is already advancing, is
    /// returned unchanged.
    pub async fn advance(&self, id: ExecutionId) -> Result<WorkflowExecution, MediaflowError> {
        let Some(_claim) = self.claim(id) else {
            debug!(execution_id = %id, "Execution is owned by another task");
            return self.load(id).await;
        };

        let execution = self.load(id).await?;
        let span = execution_span(&execution);
        self.step(execution).instrument(span).await
    }

    /// Advances an execution until it is terminal.
    pub async fn run_to_completion(
        &self,
        id: ExecutionId,
    ) -> Result<WorkflowExecution, MediaflowError> {
        let Some(_claim) = self.claim(id) else {
            return Err(MediaflowError::Busy(id));
        };

        let mut execution = self.load(id).await?;
        let span = execution_span(&execution);
        async move {
            while !execution.is_terminal() {
                execution = self.step(execution).await?;
            }
            Ok::<_, MediaflowError>(execution)
        }
        .instrument(span)
        .await
    }

    /// Runs an execution to completion on a new task, under the concurrency limit.
    pub fn spawn(&self, id: ExecutionId) -> JoinHandle<Result<WorkflowExecution, MediaflowError>> {
        let engine = self.clone();
        tokio::spawn(async move {
            let _permit = Arc::clone(&engine.permits)
                .acquire_owned()
                .await
                .map_err(|e| MediaflowError::Internal(format!("concurrency limit closed: {e}")))?;
            engine.run_to_completion(id).await
        })
    }

    /// Spawns every execution and waits for all of them.
    pub async fn run_all(
        &self,
        ids: impl IntoIterator<Item = ExecutionId>,
    ) -> Vec<Result<WorkflowExecution, MediaflowError>> {
        let handles: Vec<_> = ids.into_iter().map(|id| self.spawn(id)).collect();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined
                    .map_err(|e| MediaflowError::Internal(format!("execution task failed: {e}")))
                    .and_then(|result| result)
            })
            .collect()
    }

    /// Spawns every `Running` execution found in the store.
    ///
    /// Used after a restart: an attempt whose provider job id was persisted
    /// resumes polling that job instead of starting a new one.
    pub async fn resume_running(
        &self,
    ) -> Result<Vec<JoinHandle<Result<WorkflowExecution, MediaflowError>>>, MediaflowError> {
        let ids = self.store.list_by_status(ExecutionStatus::Running).await?;
        info!(count = ids.len(), "Resuming running executions");
        Ok(ids.into_iter().map(|id| self.spawn(id)).collect())
    }

    /// Requests cancellation.
    ///
    /// An execution nobody is advancing is cancelled and persisted at once.
    /// Otherwise the owning task observes the request at its next poll or
    /// before its next attempt, and the returned record is still `Running`.
    /// Cancelling a terminal execution changes nothing.
    pub async fn cancel(
        &self,
        id: ExecutionId,
        reason: impl Into<String>,
    ) -> Result<WorkflowExecution, MediaflowError> {
        let execution = self.load(id).await?;
        if execution.is_terminal() {
            return Ok(execution);
        }

        let reason = reason.into();
        let token = self.token(id);
        token.cancel(reason.clone());
        info!(execution_id = %id, reason = %reason, "Cancellation requested");

        let claim = self.claim(id);
        let current = self.load(id).await?;
        if current.is_terminal() {
            // The owner finished before the token was registered.
            self.tokens.remove(&id);
            return Ok(current);
        }
        match claim {
            Some(_claim) => self.finish_cancelled(current, &token).await,
            None => Ok(execution),
        }
    }

    fn claim(&self, id: ExecutionId) -> Option<Claim> {
        self.owners.insert(id).then(|| Claim {
            owners: Arc::clone(&self.owners),
            id,
        })
    }

    fn token(&self, id: ExecutionId) -> Arc<CancellationToken> {
        Arc::clone(self.tokens.entry(id).or_default().value())
    }

    async fn step(
        &self,
        mut execution: WorkflowExecution,
    ) -> Result<WorkflowExecution, MediaflowError> {
        if execution.is_terminal() {
            return Ok(execution);
        }

        let id = execution.execution_id();
        let token = self.token(id);
        if token.is_cancelled() {
            return self.finish_cancelled(execution, &token).await;
        }

        let index = execution.current_stage_index();
        let stage = self.pipeline.get(index).ok_or_else(|| {
            MediaflowError::Internal(format!(
                "execution {id} points at stage {index} of a {}-stage pipeline",
                self.pipeline.len()
            ))
        })?;
        let input = self.stage_input(&execution, index)?;

        let outcome = match execution.state(self.pipeline.len(), Some(&stage.name)) {
            ExecutionState::Pending(_) => {
                let span = stage_span(&execution, &stage.name, 1);
                self.attempt(&mut execution, stage, &input, 1, &token)
                    .instrument(span)
                    .await?
            }
            ExecutionState::WaitingOnStage { attempt, .. } => {
                let span = stage_span(&execution, &stage.name, attempt);
                if let Some(in_flight) = execution.in_flight().cloned() {
                    info!(parent: &span, provider_job_id = ?in_flight.provider_job_id, "Resuming in-flight attempt");
                    self.executor
                        .complete(stage, &input, in_flight, &token)
                        .instrument(span)
                        .await
                } else {
                    if !self.wait_for_retry(&execution, stage, attempt, &token).await {
                        return self.finish_cancelled(execution, &token).await;
                    }
                    self.attempt(&mut execution, stage, &input, attempt, &token)
                        .instrument(span)
                        .await?
                }
            }
            ExecutionState::Succeeded | ExecutionState::Failed | ExecutionState::Cancelled => {
                return Ok(execution);
            }
        };

        match outcome {
            AttemptOutcome::Cancelled(_) => self.finish_cancelled(execution, &token).await,
            AttemptOutcome::Completed(result) => self.apply(execution, stage, result).await,
        }
    }

    /// Starts an attempt, persists it while in flight, then drives it.
    async fn attempt(
        &self,
        execution: &mut WorkflowExecution,
        stage: &StageDefinition,
        input: &StageInput,
        attempt: u32,
        token: &CancellationToken,
    ) -> Result<AttemptOutcome, MediaflowError> {
        info!(kind = %stage.kind, input = %input.location, "Starting attempt");
        let started = self.executor.begin(stage, input, attempt).await;
        if !started.is_in_flight() {
            return Ok(AttemptOutcome::Completed(started));
        }

        execution.record(started.clone())?;
        self.save(execution).await?;
        Ok(self.executor.complete(stage, input, started, token).await)
    }

    /// Records a completed attempt and moves the state machine.
    async fn apply(
        &self,
        mut execution: WorkflowExecution,
        stage: &StageDefinition,
        result: StageResult,
    ) -> Result<WorkflowExecution, MediaflowError> {
        let attempt = result.attempt;
        let outcome = result.outcome;
        let classification = result.error_detail.as_ref().map(|d| d.classification);
        let message = result
            .error_detail
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        execution.record(result)?;

        match outcome {
            Some(StageOutcome::Success) => {
                if execution.current_stage_index() + 1 < self.pipeline.len() {
                    execution.advance_stage()?;
                    info!(stage = %stage.name, attempt, "Stage succeeded");
                } else {
                    execution.finish(ExecutionStatus::Succeeded)?;
                    info!(stage = %stage.name, attempt, "Final stage succeeded");
                }
            }
            Some(StageOutcome::RetryableFailure) => {
                let classification =
                    classification.unwrap_or(ErrorClassification::TransientProviderError);
                match should_retry(stage, attempt, classification) {
                    RetryDecision::Retry(delay) => warn!(
                        stage = %stage.name,
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %message,
                        "Attempt failed, will retry"
                    ),
                    RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                        error!(stage = %stage.name, attempt, error = %message, "Attempts exhausted");
                        execution.finish(ExecutionStatus::Failed)?;
                    }
                }
            }
            Some(StageOutcome::FatalFailure) => {
                error!(stage = %stage.name, attempt, error = %message, "Stage failed fatally");
                execution.finish(ExecutionStatus::Failed)?;
            }
            None => {
                return Err(MediaflowError::Internal(format!(
                    "attempt {attempt} of stage '{}' completed without an outcome",
                    stage.name
                )));
            }
        }

        self.save(&mut execution).await?;
        if execution.is_terminal() {
            self.on_terminal(&execution).await;
        }
        Ok(execution)
    }

    /// Waits out the backoff before `attempt`. Returns false if cancelled.
    async fn wait_for_retry(
        &self,
        execution: &WorkflowExecution,
        stage: &StageDefinition,
        attempt: u32,
        token: &CancellationToken,
    ) -> bool {
        let delay = stage.retry_policy.delay_for(attempt.saturating_sub(1));
        let since_failure = execution
            .last_result_for(&stage.name)
            .and_then(|r| r.ended_at)
            .and_then(|ended| (now_utc() - ended).to_std().ok())
            .unwrap_or_default();
        let remaining = delay.saturating_sub(since_failure);

        if remaining.is_zero() {
            return !token.is_cancelled();
        }

        debug!(stage = %stage.name, attempt, wait_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX), "Waiting before retry");
        tokio::select! {
            biased;
            () = token.cancelled() => false,
            () = tokio::time::sleep(remaining) => true,
        }
    }

    async fn finish_cancelled(
        &self,
        mut execution: WorkflowExecution,
        token: &CancellationToken,
    ) -> Result<WorkflowExecution, MediaflowError> {
        let reason = token
            .reason()
            .unwrap_or_else(|| ErrorClassification::CancelledByRequest.to_string());
        execution.cancel(reason.clone())?;
        self.save(&mut execution).await?;

        info!(execution_id = %execution.execution_id(), reason = %reason, "Execution cancelled");
        self.on_terminal(&execution).await;
        Ok(execution)
    }

    async fn on_terminal(&self, execution: &WorkflowExecution) {
        self.tokens.remove(&execution.execution_id());
        self.notifier
            .notify(ExecutionNotification::from_execution(execution))
            .await;
    }

    async fn save(&self, execution: &mut WorkflowExecution) -> Result<(), MediaflowError> {
        self.store.save(execution).await.map_err(|e| {
            warn!(execution_id = %execution.execution_id(), error = %e, "Save rejected");
            e.into()
        })
    }

    /// Input of stage `index`: the raw source for the first stage, otherwise
    /// the output of the previous stage's successful attempt.
    fn stage_input(
        &self,
        execution: &WorkflowExecution,
        index: usize,
    ) -> Result<StageInput, MediaflowError> {
        let stage = self
            .pipeline
            .get(index)
            .ok_or_else(|| MediaflowError::Internal(format!("no stage at index {index}")))?;

        let location = match index.checked_sub(1).and_then(|i| self.pipeline.get(i)) {
            None => execution.source_location().to_string(),
            Some(previous) => execution
                .output_of(&previous.name)
                .ok_or_else(|| {
                    MediaflowError::Internal(format!(
                        "stage '{}' has no successful output in execution {}",
                        previous.name,
                        execution.execution_id()
                    ))
                })?
                .to_string(),
        };

        Ok(StageInput::new(
            execution.execution_id(),
            execution.artifact_key(),
            &stage.name,
            location,
        ))
    }
}
