//! An in-memory job provider that finishes jobs after a number of polls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{JobAdapter, JobStatus};
use crate::core::StageInput;
use crate::errors::ProviderError;
use crate::storage::naming::stage_output_location;
use crate::storage::ArtifactStorage;

#[derive(Debug, Clone)]
struct SimulatedJob {
    artifact_key: String,
    polls: u32,
}

/// Stand-in for a transcoding or transcription service.
///
/// Each job reports `Running` until it has been polled `polls_to_complete`
/// times, then succeeds with `<output_prefix>/<artifact_key>.<extension>`.
/// When storage is attached, the configured contents are written there on
/// completion so a downstream local transform can read them.
pub struct SimulatedJobAdapter {
    provider: String,
    output_prefix: String,
    output_extension: String,
    polls_to_complete: u32,
    output: Option<(Arc<dyn ArtifactStorage>, String)>,
    jobs: Mutex<HashMap<String, SimulatedJob>>,
    next_id: AtomicU64,
}

impl fmt::Debug for SimulatedJobAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedJobAdapter")
            .field("provider", &self.provider)
            .field("output_prefix", &self.output_prefix)
            .field("output_extension", &self.output_extension)
            .field("polls_to_complete", &self.polls_to_complete)
            .field("jobs", &self.jobs.lock().len())
            .finish_non_exhaustive()
    }
}

impl SimulatedJobAdapter {
    /// Creates a provider whose jobs finish on the first poll.
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
            polls_to_complete: 1,
            output: None,
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sets how many polls a job takes to finish.
    #[must_use]
    pub fn with_polls_to_complete(mut self, polls: u32) -> Self {
        self.polls_to_complete = polls.max(1);
        self
    }

    /// Writes `contents` to the output location when a job finishes.
    #[must_use]
    pub fn with_output(mut self, storage: Arc<dyn ArtifactStorage>, contents: impl Into<String>) -> Self {
        self.output = Some((storage, contents.into()));
        self
    }

    /// Returns the number of jobs started so far.
    #[must_use]
    pub fn started_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Returns how often a job has been polled.
    #[must_use]
    pub fn poll_count(&self, provider_job_id: &str) -> Option<u32> {
        self.jobs.lock().get(provider_job_id).map(|job| job.polls)
    }
}

#[async_trait]
impl JobAdapter for SimulatedJobAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn start(&self, input: &StageInput) -> Result<String, ProviderError> {
        let id = format!(
            "{}-{}",
            self.provider,
            self.next_id.fetch_add(1, Ordering::Relaxed)
        );
        self.jobs.lock().insert(
            id.clone(),
            SimulatedJob {
                artifact_key: input.artifact_key.clone(),
                polls: 0,
            },
        );
        Ok(id)
    }

    async fn poll(&self, provider_job_id: &str) -> Result<JobStatus, ProviderError> {
        let finished_key = {
            let mut jobs = self.jobs.lock();
            let job = jobs.get_mut(provider_job_id).ok_or_else(|| {
                ProviderError::new("NoSuchJob", format!("unknown job {provider_job_id}"))
            })?;
            job.polls += 1;
            (job.polls >= self.polls_to_complete).then(|| job.artifact_key.clone())
        };

        let Some(artifact_key) = finished_key else {
            return Ok(JobStatus::Running);
        };

        let output_location =
            stage_output_location(&self.output_prefix, &artifact_key, &self.output_extension);
        if let Some((storage, contents)) = &self.output {
            storage
                .put_text(&output_location, contents)
                .await
                .map_err(|e| ProviderError::new("InternalFailure", e.to_string()))?;
        }
        Ok(JobStatus::Succeeded { output_location })
    }
}
