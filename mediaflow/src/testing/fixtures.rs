//! Fixtures wiring a complete engine over in-memory collaborators.

use std::sync::Arc;

use super::{CollectingNotifier, ScriptedJobAdapter};
use crate::engine::WorkflowEngine;
use crate::errors::ConfigurationError;
use crate::executor::StageExecutor;
use crate::pipeline::{PipelineDefinition, EXTRACT_TEXT_STAGE, TRANSCODE_STAGE, TRANSCRIBE_STAGE};
use crate::storage::naming::stage_output_location;
use crate::storage::InMemoryArtifactStorage;
use crate::store::{ExecutionStore, InMemoryExecutionStore};
use crate::transform::TextExtractTransform;

/// A two-cue subtitle document.
pub const SAMPLE_SRT: &str = "1
00:00:00,000 --> 00:00:03,000
Welcome to the course.

2
00:00:03,000 --> 00:00:07,000
Today we cover OSPF routing.
";

/// Text extracted from [`SAMPLE_SRT`].
pub const SAMPLE_TEXT: &str = "Welcome to the course. Today we cover OSPF routing.";

/// Prefix of transcoded media outputs.
pub const MEDIA_PREFIX: &str = "media";
/// Prefix of subtitle outputs.
pub const TRANSCRIPT_PREFIX: &str = "transcripts";
/// Prefix of extracted text outputs.
pub const TEXT_PREFIX: &str = "text";

/// In-memory collaborators for the default transcription pipeline.
///
/// Both providers are [`ScriptedJobAdapter`]s. The transcriber's default
/// output (`transcripts/<key>.srt`) is expected to be present in `storage`;
/// use [`with_transcript`](Self::with_transcript) to add it.
#[derive(Debug)]
pub struct TestHarness {
    /// Artifact storage read and written by the text stage.
    pub storage: Arc<InMemoryArtifactStorage>,
    /// Execution store.
    pub store: Arc<InMemoryExecutionStore>,
    /// Notifier collecting terminal notifications.
    pub notifier: Arc<CollectingNotifier>,
    /// Adapter of the `transcode` stage.
    pub transcoder: Arc<ScriptedJobAdapter>,
    /// Adapter of the `transcribe` stage.
    pub transcriber: Arc<ScriptedJobAdapter>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Creates a harness whose providers always succeed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(InMemoryArtifactStorage::new()),
            store: Arc::new(InMemoryExecutionStore::new()),
            notifier: Arc::new(CollectingNotifier::new()),
            transcoder: Arc::new(ScriptedJobAdapter::new("transcoder", MEDIA_PREFIX, "mp3")),
            transcriber: Arc::new(ScriptedJobAdapter::new(
                "transcriber",
                TRANSCRIPT_PREFIX,
                "srt",
            )),
        }
    }

    /// Replaces the transcoder.
    #[must_use]
    pub fn with_transcoder(mut self, adapter: ScriptedJobAdapter) -> Self {
        self.transcoder = Arc::new(adapter);
        self
    }

    /// Replaces the transcriber.
    #[must_use]
    pub fn with_transcriber(mut self, adapter: ScriptedJobAdapter) -> Self {
        self.transcriber = Arc::new(adapter);
        self
    }

    /// Stores [`SAMPLE_SRT`] where the transcriber reports its output.
    #[must_use]
    pub fn with_transcript(self, artifact_key: &str) -> Self {
        self.storage.insert(
            stage_output_location(TRANSCRIPT_PREFIX, artifact_key, "srt"),
            SAMPLE_SRT,
        );
        self
    }

    /// Builds an executor with both providers and the text stage registered.
    #[must_use]
    pub fn executor(&self) -> StageExecutor {
        StageExecutor::new()
            .with_adapter(TRANSCODE_STAGE, Arc::clone(&self.transcoder) as _)
            .with_adapter(TRANSCRIBE_STAGE, Arc::clone(&self.transcriber) as _)
            .with_transform(
                EXTRACT_TEXT_STAGE,
                Arc::new(TextExtractTransform::new(
                    Arc::clone(&self.storage) as _,
                    TEXT_PREFIX,
                )),
            )
    }

    /// Builds an engine for `pipeline` over this harness.
    pub fn engine_for(&self, pipeline: PipelineDefinition) -> Result<WorkflowEngine, ConfigurationError> {
        Ok(WorkflowEngine::new(
            Arc::new(pipeline),
            self.executor(),
            Arc::clone(&self.store) as Arc<dyn ExecutionStore>,
        )?
        .with_notifier(Arc::clone(&self.notifier) as _))
    }

    /// Builds an engine for the default transcription pipeline.
    pub fn engine(&self) -> Result<WorkflowEngine, ConfigurationError> {
        self.engine_for(PipelineDefinition::transcription())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{extract, parse_srt};

    #[test]
    fn test_sample_text_matches_sample_srt() {
        let entries = parse_srt(SAMPLE_SRT).unwrap();
        assert_eq!(extract(&entries), SAMPLE_TEXT);
    }

    #[test]
    fn test_harness_engine_builds() {
        let harness = TestHarness::new().with_transcript("lecture01");
        assert!(harness.engine().is_ok());
        assert_eq!(
            harness.storage.locations(),
            vec!["transcripts/lecture01.srt".to_string()]
        );
    }
}
