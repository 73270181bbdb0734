//! Error types for the mediaflow orchestrator.
//!
//! Stage-level failures are never raised as Rust errors: they are classified
//! into an [`ErrorClassification`] and recorded as data on a
//! [`StageResult`](crate::core::StageResult). The `Error` enums in this module
//! cover the remaining concerns (configuration, persistence, provider calls,
//! local transforms) and the crate-level [`MediaflowError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::{ExecutionId, ExecutionStatus};

/// Classification attached to every stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClassification {
    /// Network, throttling or provider-side transient job failure.
    TransientProviderError,
    /// The stage exceeded its timeout ceiling while the job was still running.
    Timeout,
    /// Malformed or unsupported input, unparsable subtitle structure.
    PermanentInputError,
    /// The process cannot proceed (missing stage wiring, invalid policy).
    ConfigurationError,
    /// The execution was cancelled. Terminal, not an error.
    CancelledByRequest,
}

impl ErrorClassification {
    /// Returns true if retrying the stage may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientProviderError | Self::Timeout)
    }

    /// Returns true if the classification ends the execution immediately.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PermanentInputError | Self::ConfigurationError)
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientProviderError => write!(f, "TransientProviderError"),
            Self::Timeout => write!(f, "Timeout"),
            Self::PermanentInputError => write!(f, "PermanentInputError"),
            Self::ConfigurationError => write!(f, "ConfigurationError"),
            Self::CancelledByRequest => write!(f, "CancelledByRequest"),
        }
    }
}

/// Structured error recorded on a failed stage attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// How the failure was classified.
    pub classification: ErrorClassification,
    /// Human readable message.
    pub message: String,
    /// Provider-specific error code, when the failure came from a provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<String>,
}

impl ErrorDetail {
    /// Creates a new error detail.
    #[must_use]
    pub fn new(classification: ErrorClassification, message: impl Into<String>) -> Self {
        Self {
            classification,
            message: message.into(),
            provider_code: None,
        }
    }

    /// Sets the provider error code.
    #[must_use]
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider_code {
            Some(code) => write!(f, "{} [{}]: {}", self.classification, code, self.message),
            None => write!(f, "{}: {}", self.classification, self.message),
        }
    }
}

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum MediaflowError {
    /// Static configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigurationError),

    /// The execution store rejected or failed an operation.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// No execution with this id is known to the store.
    #[error("Unknown execution: {0}")]
    UnknownExecution(ExecutionId),

    /// Another task is advancing this execution.
    #[error("Execution {0} is being advanced by another task")]
    Busy(ExecutionId),

    /// An internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error raised when the process-wide configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The pipeline has no stages.
    #[error("Pipeline must define at least one stage")]
    EmptyPipeline,

    /// Two stages share a name.
    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    /// A retry policy is not usable.
    #[error("Invalid retry policy for stage '{stage}': {reason}")]
    InvalidPolicy {
        /// The stage name.
        stage: String,
        /// Why the policy was rejected.
        reason: String,
    },

    /// A stage timeout is not usable.
    #[error("Invalid timeout for stage '{stage}': {reason}")]
    InvalidTimeout {
        /// The stage name.
        stage: String,
        /// Why the timeout was rejected.
        reason: String,
    },

    /// No job adapter is registered for an external job stage.
    #[error("No job adapter registered for stage '{0}'")]
    MissingAdapter(String),

    /// No transform is registered for a local transform stage.
    #[error("No local transform registered for stage '{0}'")]
    MissingTransform(String),

    /// Engine settings are not usable.
    #[error("Invalid engine configuration: {0}")]
    InvalidEngine(String),

    /// The configuration source could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Errors returned by an [`ExecutionStore`](crate::store::ExecutionStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for this id.
    #[error("Execution not found: {0}")]
    NotFound(ExecutionId),

    /// The record was modified since it was loaded by the caller.
    #[error("Version conflict for execution {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The execution id.
        id: ExecutionId,
        /// The version the caller loaded.
        expected: u64,
        /// The version currently stored.
        found: u64,
    },

    /// A terminal record cannot be overwritten.
    #[error("Execution {id} is already terminal ({status})")]
    AlreadyTerminal {
        /// The execution id.
        id: ExecutionId,
        /// The stored terminal status.
        status: ExecutionStatus,
    },

    /// The record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by a job provider when starting or polling a job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Provider error code (e.g. `ThrottlingException`).
    pub code: String,
    /// Provider error message.
    pub message: String,
}

impl ProviderError {
    /// Creates a new provider error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classifies this error with the provider rule table.
    #[must_use]
    pub fn classify(&self) -> ErrorClassification {
        crate::adapters::classify_provider_error(&self.code, &self.message)
    }

    /// Converts to a classified [`ErrorDetail`].
    #[must_use]
    pub fn to_detail(&self) -> ErrorDetail {
        ErrorDetail::new(self.classify(), self.message.clone()).with_provider_code(self.code.clone())
    }
}

/// Errors raised by a local transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The upstream subtitle document is malformed.
    #[error("{0}")]
    Parse(#[from] crate::transform::SubtitleParseError),

    /// Reading the input or writing the output failed.
    #[error("Artifact storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by an [`ArtifactStorage`](crate::storage::ArtifactStorage).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing is stored at this location.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// The location cannot be resolved by this storage.
    #[error("Invalid artifact location: '{0}'")]
    InvalidLocation(String),

    /// The artifact is not valid UTF-8 text.
    #[error("Artifact is not UTF-8 text: {0}")]
    NotText(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
