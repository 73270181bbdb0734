//! # Mediaflow
//!
//! Workflow orchestration for media-to-transcript pipelines.
//!
//! An uploaded media file triggers an execution that runs through an ordered
//! list of stages (transcode, transcribe, extract text). External job stages
//! are started on a provider and polled until they finish; local transform
//! stages run in process. Every attempt is recorded on the execution, so its
//! full history stays queryable after it succeeds, fails or is cancelled.
//!
//! - **Retry with backoff**: per-stage attempt limits and capped exponential delays
//! - **Failure classification**: transient, timeout, permanent input and configuration errors
//! - **Cooperative cancellation**: observed between polls and before each attempt
//! - **Resumable**: in-flight provider jobs are persisted and polled again after a restart
//! - **Deterministic text extraction** from SRT subtitles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mediaflow::prelude::*;
//!
//! let executor = StageExecutor::new()
//!     .with_adapter(TRANSCODE_STAGE, transcoder)
//!     .with_adapter(TRANSCRIBE_STAGE, transcriber)
//!     .with_transform(EXTRACT_TEXT_STAGE, Arc::new(TextExtractTransform::new(storage, "text")));
//!
//! let engine = WorkflowEngine::new(
//!     Arc::new(PipelineDefinition::transcription()),
//!     executor,
//!     Arc::new(InMemoryExecutionStore::new()),
//! )?;
//!
//! let id = engine.start(TriggerEvent::from_location("uploads/lecture01.mp4")).await?;
//! let execution = engine.run_to_completion(id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod testing;
pub mod transform;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{JobAdapter, JobHandle, JobStatus, SimulatedJobAdapter};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, PipelineConfig, RetryPolicyConfig, StageConfig};
    pub use crate::core::{
        ExecutionId, ExecutionState, ExecutionStatus, StageInput, StageKind, StageOutcome,
        StageResult, WorkflowExecution,
    };
    pub use crate::engine::{TriggerEvent, WorkflowEngine};
    pub use crate::errors::{
        ConfigurationError, ErrorClassification, ErrorDetail, MediaflowError, ProviderError,
        StoreError,
    };
    pub use crate::executor::StageExecutor;
    pub use crate::notify::{ExecutionNotification, LoggingNotifier, NoOpNotifier, Notifier};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        should_retry, PipelineDefinition, RetryDecision, RetryPolicy, StageDefinition,
        EXTRACT_TEXT_STAGE, TRANSCODE_STAGE, TRANSCRIBE_STAGE,
    };
    pub use crate::storage::{ArtifactStorage, InMemoryArtifactStorage, LocalFsArtifactStorage};
    pub use crate::store::{ExecutionStore, InMemoryExecutionStore, JsonFileExecutionStore};
    pub use crate::transform::{extract, parse_srt, LocalTransform, TextExtractTransform};
}
