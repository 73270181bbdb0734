//! Inbound trigger notifications.

use serde::{Deserialize, Serialize};

use crate::storage::naming::base_name;

/// Notification that a raw media file is ready to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Base name shared by every artifact of the run.
    pub artifact_key: String,
    /// Where the raw media file was uploaded.
    pub raw_input_location: String,
}

impl TriggerEvent {
    /// Creates a trigger.
    #[must_use]
    pub fn new(artifact_key: impl Into<String>, raw_input_location: impl Into<String>) -> Self {
        Self {
            artifact_key: artifact_key.into(),
            raw_input_location: raw_input_location.into(),
        }
    }

    /// Creates a trigger whose artifact key is the file's base name.
    #[must_use]
    pub fn from_location(raw_input_location: impl Into<String>) -> Self {
        let raw_input_location = raw_input_location.into();
        Self {
            artifact_key: base_name(&raw_input_location).to_string(),
            raw_input_location,
        }
    }
}
