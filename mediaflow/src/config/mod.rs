//! Serde-loadable configuration for pipelines and the engine.
//!
//! Configuration is read once at startup and turned into an immutable
//! [`PipelineDefinition`](crate::pipeline::PipelineDefinition) shared by
//! every execution.

mod engine;
mod stage;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigurationError;
use crate::pipeline::PipelineDefinition;

pub use engine::{EngineConfig, PollConfig};
pub use stage::{RetryPolicyConfig, StageConfig};

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stages in execution order.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_stages() -> Vec<StageConfig> {
    PipelineDefinition::transcription()
        .stages()
        .iter()
        .map(StageConfig::from)
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Sets the engine settings.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Builds and validates the pipeline definition.
    pub fn pipeline(&self) -> Result<PipelineDefinition, ConfigurationError> {
        PipelineDefinition::from_config(self)
    }

    /// Validates the whole document.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.engine.validate()?;
        self.pipeline().map(|_| ())
    }
}
