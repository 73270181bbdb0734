//! Local transforms and the subtitle-to-text extractor.
//!
//! The extractor is pure: [`parse_srt`] turns the transcription provider's
//! subtitle document into [`SubtitleEntry`] values and [`extract`] assembles
//! their text into prose. [`TextExtractTransform`] wires both to artifact
//! storage as the pipeline's `extract_text` stage.

mod extract;
mod srt;
mod text_stage;

use async_trait::async_trait;

use crate::core::StageInput;
use crate::errors::TransformError;

pub use extract::{extract, extract_with, ExtractOptions, DEFAULT_PARAGRAPH_WIDTH};
pub use srt::{parse_srt, InvalidTimecode, SubtitleEntry, SubtitleParseError, Timecode};
pub use text_stage::TextExtractTransform;

/// A stage whose work runs in-process.
///
/// Failures are never retried by the engine's classification: a transform
/// error means the upstream artifact is bad and will not change.
#[async_trait]
pub trait LocalTransform: Send + Sync {
    /// Transform name used in logs.
    fn name(&self) -> &str;

    /// Runs the transform and returns the location of its output.
    async fn apply(&self, input: &StageInput) -> Result<String, TransformError>;
}
