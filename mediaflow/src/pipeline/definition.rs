//! Static stage and pipeline definitions.

use std::collections::HashSet;
use std::time::Duration;

use super::RetryPolicy;
use crate::config::PipelineConfig;
use crate::core::StageKind;
use crate::errors::ConfigurationError;

/// Name of the default transcoding stage.
pub const TRANSCODE_STAGE: &str = "transcode";
/// Name of the default speech-to-text stage.
pub const TRANSCRIBE_STAGE: &str = "transcribe";
/// Name of the default text extraction stage.
pub const EXTRACT_TEXT_STAGE: &str = "extract_text";

/// Definition of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    /// Unique stage name.
    pub name: String,
    /// The kind of work the stage performs.
    pub kind: StageKind,
    /// Retry policy for failed attempts.
    pub retry_policy: RetryPolicy,
    /// Timeout ceiling for one attempt.
    pub timeout: Duration,
    /// Extension of the artifact the stage produces (`mp3`, `srt`, `txt`).
    pub output_extension: Option<String>,
}

impl StageDefinition {
    /// Default timeout ceiling for one attempt.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    /// Creates a stage definition with the default policy and timeout.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            retry_policy: RetryPolicy::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            output_extension: None,
        }
    }

    /// Creates an external job stage.
    #[must_use]
    pub fn external_job(name: impl Into<String>) -> Self {
        Self::new(name, StageKind::ExternalJob)
    }

    /// Creates a local transform stage.
    #[must_use]
    pub fn local_transform(name: impl Into<String>) -> Self {
        Self::new(name, StageKind::LocalTransform)
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the timeout ceiling.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the output extension.
    #[must_use]
    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = Some(extension.into());
        self
    }

    /// Validates the definition.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.retry_policy.validate(&self.name)?;
        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout {
                stage: self.name.clone(),
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// The ordered, immutable list of stages every execution runs through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    stages: Vec<StageDefinition>,
}

impl PipelineDefinition {
    /// Creates a validated pipeline definition.
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::EmptyPipeline);
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            stage.validate()?;
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigurationError::DuplicateStage(stage.name.clone()));
            }
        }

        Ok(Self { stages })
    }

    /// Builds and validates a pipeline from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigurationError> {
        let stages = config
            .stages
            .iter()
            .map(crate::config::StageConfig::to_definition)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stages)
    }

    /// The default media-to-transcript pipeline: transcode, transcribe, extract text.
    #[must_use]
    pub fn transcription() -> Self {
        Self {
            stages: vec![
                StageDefinition::external_job(TRANSCODE_STAGE)
                    .with_timeout(Duration::from_secs(2 * 60 * 60))
                    .with_output_extension("mp3"),
                StageDefinition::external_job(TRANSCRIBE_STAGE)
                    .with_timeout(Duration::from_secs(6 * 60 * 60))
                    .with_output_extension("srt"),
                StageDefinition::local_transform(EXTRACT_TEXT_STAGE)
                    .with_retry_policy(RetryPolicy::no_retry())
                    .with_timeout(Duration::from_secs(5 * 60))
                    .with_output_extension("txt"),
            ],
        }
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Returns the stage at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    /// Returns the stage with `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a validated pipeline has at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_pipeline() {
        let pipeline = PipelineDefinition::transcription();
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec![TRANSCODE_STAGE, TRANSCRIBE_STAGE, EXTRACT_TEXT_STAGE]);
        assert_eq!(pipeline.get(2).map(|s| s.kind), Some(StageKind::LocalTransform));
        assert!(PipelineDefinition::new(pipeline.stages().to_vec()).is_ok());
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert_eq!(
            PipelineDefinition::new(Vec::new()),
            Err(ConfigurationError::EmptyPipeline)
        );
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let result = PipelineDefinition::new(vec![
            StageDefinition::external_job("transcode"),
            StageDefinition::local_transform("transcode"),
        ]);
        assert_eq!(
            result,
            Err(ConfigurationError::DuplicateStage("transcode".to_string()))
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let stage = StageDefinition::external_job("transcode").with_timeout(Duration::ZERO);
        assert!(matches!(
            stage.validate(),
            Err(ConfigurationError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_find_stage() {
        let pipeline = PipelineDefinition::transcription();
        assert!(pipeline.find(TRANSCRIBE_STAGE).is_some());
        assert!(pipeline.find("missing").is_none());
    }
}
