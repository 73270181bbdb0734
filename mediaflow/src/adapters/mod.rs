//! Adapters for external long-running job providers.
//!
//! A [`JobAdapter`] starts a job for a stage input and reports its status
//! when polled. Provider failures are mapped to an
//! [`ErrorClassification`](crate::errors::ErrorClassification) by a rule
//! table so every adapter classifies the same way.

mod classify;
mod job;
mod simulated;

pub use classify::classify_provider_error;
#[cfg(test)]
pub use job::MockJobAdapter;
pub use job::{JobAdapter, JobHandle, JobStatus};
pub use simulated::SimulatedJobAdapter;
