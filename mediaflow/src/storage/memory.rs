//! In-memory artifact storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::ArtifactStorage;
use crate::errors::StorageError;

/// Artifact storage backed by a map, for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStorage {
    artifacts: RwLock<HashMap<String, String>>,
}

impl InMemoryArtifactStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with_artifact(self, location: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(location, contents);
        self
    }

    /// Stores an artifact.
    pub fn insert(&self, location: impl Into<String>, contents: impl Into<String>) {
        self.artifacts.write().insert(location.into(), contents.into());
    }

    /// Returns a copy of an artifact.
    #[must_use]
    pub fn get(&self, location: &str) -> Option<String> {
        self.artifacts.read().get(location).cloned()
    }

    /// Returns the stored locations, sorted.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<_> = self.artifacts.read().keys().cloned().collect();
        locations.sort();
        locations
    }
}

#[async_trait]
impl ArtifactStorage for InMemoryArtifactStorage {
    async fn get_text(&self, location: &str) -> Result<String, StorageError> {
        self.get(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))
    }

    async fn put_text(&self, location: &str, contents: &str) -> Result<(), StorageError> {
        self.insert(location, contents);
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        Ok(self.artifacts.read().contains_key(location))
    }
}
