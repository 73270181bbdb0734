//! The `extract_text` stage.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::{extract_with, parse_srt, ExtractOptions, LocalTransform};
use crate::core::StageInput;
use crate::errors::TransformError;
use crate::storage::naming::stage_output_location;
use crate::storage::ArtifactStorage;

/// Reads the upstream subtitle artifact, extracts its text and writes
/// `<text_prefix>/<artifact_key>.txt`.
pub struct TextExtractTransform {
    storage: Arc<dyn ArtifactStorage>,
    text_prefix: String,
    extension: String,
    options: ExtractOptions,
}

impl fmt::Debug for TextExtractTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextExtractTransform")
            .field("text_prefix", &self.text_prefix)
            .field("extension", &self.extension)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TextExtractTransform {
    /// Creates the transform with default extraction options.
    #[must_use]
    pub fn new(storage: Arc<dyn ArtifactStorage>, text_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            text_prefix: text_prefix.into(),
            extension: "txt".to_string(),
            options: ExtractOptions::default(),
        }
    }

    /// Sets the extraction options.
    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the output extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

#[async_trait]
impl LocalTransform for TextExtractTransform {
    fn name(&self) -> &str {
        "text_extract"
    }

    async fn apply(&self, input: &StageInput) -> Result<String, TransformError> {
        let content = self.storage.get_text(&input.location).await?;
        let entries = parse_srt(&content)?;
        let text = extract_with(&entries, &self.options);

        let output = stage_output_location(&self.text_prefix, &input.artifact_key, &self.extension);
        self.storage.put_text(&output, &text).await?;

        tracing::info!(
            source = %input.location,
            output = %output,
            entries = entries.len(),
            chars = text.chars().count(),
            "Extracted subtitle text"
        );
        Ok(output)
    }
}
