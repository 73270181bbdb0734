//! Scripted collaborators for engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::adapters::{JobAdapter, JobStatus};
use crate::core::StageInput;
use crate::errors::ProviderError;
use crate::notify::{ExecutionNotification, Notifier};
use crate::storage::naming::stage_output_location;

/// What one started job (or start call) of a [`ScriptedJobAdapter`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAttempt {
    /// The start call itself fails.
    StartError(ProviderError),
    /// The job reports `Running` for `running_polls` polls, then `status`.
    Finish {
        /// Polls answered with `Running` first.
        running_polls: u32,
        /// Final status.
        status: JobStatus,
    },
    /// The job reports `Running` forever.
    NeverFinishes,
}

impl ScriptedAttempt {
    /// A job that fails on its first poll.
    #[must_use]
    pub fn fails_with(code: &str, message: &str) -> Self {
        Self::Finish {
            running_polls: 0,
            status: JobStatus::Failed {
                error: ProviderError::new(code, message),
            },
        }
    }

    /// A job that succeeds after `running_polls` running polls.
    #[must_use]
    pub fn succeeds_after(running_polls: u32, output_location: impl Into<String>) -> Self {
        Self::Finish {
            running_polls,
            status: JobStatus::Succeeded {
                output_location: output_location.into(),
            },
        }
    }
}

#[derive(Debug)]
struct ScriptedJob {
    script: ScriptedAttempt,
    polls: u32,
}

/// A job adapter that plays back one [`ScriptedAttempt`] per start call.
///
/// Once the script is used up, jobs succeed on the first poll with
/// `<output_prefix>/<artifact_key>.<extension>`.
#[derive(Debug)]
pub struct ScriptedJobAdapter {
    provider: String,
    output_prefix: String,
    output_extension: String,
    script: Mutex<VecDeque<ScriptedAttempt>>,
    jobs: Mutex<HashMap<String, ScriptedJob>>,
    inputs: Mutex<Vec<StageInput>>,
    start_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedJobAdapter {
    /// Creates an adapter with an empty script.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        output_prefix: impl Into<String>,
        output_extension: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            output_prefix: output_prefix.into(),
            output_extension: output_extension.into(),
            script: Mutex::new(VecDeque::new()),
            jobs: Mutex::new(HashMap::new()),
            inputs: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
        }
    }

    /// Appends the behaviour of the next start call.
    #[must_use]
    pub fn then(self, attempt: ScriptedAttempt) -> Self {
        self.script.lock().push_back(attempt);
        self
    }

    /// Registers a job started before this adapter existed, e.g. by a
    /// process that crashed.
    #[must_use]
    pub fn with_existing_job(self, provider_job_id: impl Into<String>, script: ScriptedAttempt) -> Self {
        self.jobs
            .lock()
            .insert(provider_job_id.into(), ScriptedJob { script, polls: 0 });
        self
    }

    /// Number of start calls.
    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of poll calls, across all jobs.
    #[must_use]
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Inputs passed to start calls, in order.
    #[must_use]
    pub fn started_inputs(&self) -> Vec<StageInput> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl JobAdapter for ScriptedJobAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn start(&self, input: &StageInput) -> Result<String, ProviderError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inputs.lock().push(input.clone());

        let script = self.script.lock().pop_front().unwrap_or_else(|| {
            ScriptedAttempt::succeeds_after(
                0,
                stage_output_location(&self.output_prefix, &input.artifact_key, &self.output_extension),
            )
        });
        if let ScriptedAttempt::StartError(error) = script {
            return Err(error);
        }

        let id = format!("{}-job-{n}", self.provider);
        self.jobs
            .lock()
            .insert(id.clone(), ScriptedJob { script, polls: 0 });
        Ok(id)
    }

    async fn poll(&self, provider_job_id: &str) -> Result<JobStatus, ProviderError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(provider_job_id).ok_or_else(|| {
            ProviderError::new("NoSuchJob", format!("unknown job {provider_job_id}"))
        })?;
        job.polls += 1;

        Ok(match &job.script {
            ScriptedAttempt::Finish { running_polls, status } if job.polls > *running_polls => {
                status.clone()
            }
            ScriptedAttempt::StartError(error) => JobStatus::Failed { error: error.clone() },
            ScriptedAttempt::Finish { .. } | ScriptedAttempt::NeverFinishes => JobStatus::Running,
        })
    }
}

/// A notifier that keeps every notification.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<ExecutionNotification>>,
}

impl CollectingNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications received so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<ExecutionNotification> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, notification: ExecutionNotification) {
        self.received.lock().push(notification);
    }
}
