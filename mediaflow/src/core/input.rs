//! Input handed to one stage attempt.

use serde::{Deserialize, Serialize};

use super::ExecutionId;

/// Input of a stage attempt.
///
/// The first stage reads the raw trigger location; every later stage reads
/// the `output_ref` of the previous stage's successful attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInput {
    /// The execution the attempt belongs to.
    pub execution_id: ExecutionId,
    /// Shared base name of every artifact of the execution.
    pub artifact_key: String,
    /// Name of the stage being run.
    pub stage_name: String,
    /// Location of the artifact the stage consumes.
    pub location: String,
}

impl StageInput {
    /// Creates a stage input.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        artifact_key: impl Into<String>,
        stage_name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            artifact_key: artifact_key.into(),
            stage_name: stage_name.into(),
            location: location.into(),
        }
    }
}
