//! The job adapter trait and a handle to a started job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::StageInput;
use crate::errors::ProviderError;

/// Status of an external job as reported by its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// The job is queued or in progress.
    Running,
    /// The job finished and produced its output.
    Succeeded {
        /// Location of the produced artifact.
        output_location: String,
    },
    /// The job finished unsuccessfully.
    Failed {
        /// The provider's failure.
        error: ProviderError,
    },
}

impl JobStatus {
    /// Returns true once the provider reports a final status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A provider of long-running jobs (transcoding, transcription).
///
/// Implementations only talk to the provider; retry, timeout and
/// classification are handled by the stage executor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobAdapter: Send + Sync {
    /// Provider name used in logs.
    fn provider(&self) -> &str;

    /// Starts a job for the input and returns the provider job id.
    async fn start(&self, input: &StageInput) -> Result<String, ProviderError>;

    /// Polls a previously started job.
    async fn poll(&self, provider_job_id: &str) -> Result<JobStatus, ProviderError>;
}

/// Handle to a started job.
#[derive(Clone)]
pub struct JobHandle {
    provider_job_id: String,
    adapter: Arc<dyn JobAdapter>,
    started: Instant,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("provider", &self.adapter.provider())
            .field("provider_job_id", &self.provider_job_id)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

impl JobHandle {
    /// Starts a job with the adapter.
    pub async fn start(
        adapter: Arc<dyn JobAdapter>,
        input: &StageInput,
    ) -> Result<Self, ProviderError> {
        let provider_job_id = adapter.start(input).await?;
        Ok(Self {
            provider_job_id,
            adapter,
            started: Instant::now(),
        })
    }

    /// Reattaches to a job started earlier, possibly by another process.
    #[must_use]
    pub fn resume(
        adapter: Arc<dyn JobAdapter>,
        provider_job_id: impl Into<String>,
        already_elapsed: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            provider_job_id: provider_job_id.into(),
            adapter,
            started: now.checked_sub(already_elapsed).unwrap_or(now),
        }
    }

    /// Returns the provider job id.
    #[must_use]
    pub fn provider_job_id(&self) -> &str {
        &self.provider_job_id
    }

    /// Returns the time since the job was started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Polls the job once.
    pub async fn status(&self) -> Result<JobStatus, ProviderError> {
        self.adapter.poll(&self.provider_job_id).await
    }
}
