//! Artifact storage used by local transforms.
//!
//! External job providers read and write artifacts themselves; only local
//! transforms need the orchestrator to move bytes. Locations are the opaque
//! strings carried in `StageResult::output_ref`.

mod local;
mod memory;
pub mod naming;

use async_trait::async_trait;

use crate::errors::StorageError;

pub use local::LocalFsArtifactStorage;
pub use memory::InMemoryArtifactStorage;

/// Read/write access to text artifacts by location.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Reads a UTF-8 text artifact.
    async fn get_text(&self, location: &str) -> Result<String, StorageError>;

    /// Writes a text artifact, replacing any existing one.
    async fn put_text(&self, location: &str, contents: &str) -> Result<(), StorageError>;

    /// Returns true if an artifact exists at the location.
    async fn exists(&self, location: &str) -> Result<bool, StorageError>;
}
