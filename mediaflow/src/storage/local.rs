//! Local filesystem artifact storage.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ArtifactStorage;
use crate::errors::StorageError;

/// Artifact storage rooted at a local directory.
///
/// Locations are relative paths below the root; absolute paths and `..`
/// components are rejected.
#[derive(Debug, Clone)]
pub struct LocalFsArtifactStorage {
    root: PathBuf,
}

impl LocalFsArtifactStorage {
    /// Creates a storage rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if location.is_empty() || escapes {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Sibling temp path for `path`, keeping its full file name.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactStorage for LocalFsArtifactStorage {
    async fn get_text(&self, location: &str) -> Result<String, StorageError> {
        let path = self.resolve(location)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        String::from_utf8(bytes).map_err(|_| StorageError::NotText(location.to_string()))
    }

    async fn put_text(&self, location: &str, contents: &str) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = partial_path(&path);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        let path = self.resolve(location)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_creates_directories() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFsArtifactStorage::new(dir.path());

        storage
            .put_text("text/lecture01.txt", "Welcome to the course.")
            .await
            .unwrap();

        assert!(dir.path().join("text/lecture01.txt").exists());
        assert!(!dir.path().join("text/lecture01.txt.partial").exists());
        assert_eq!(
            storage.get_text("text/lecture01.txt").await.unwrap(),
            "Welcome to the course."
        );
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("text/lecture01.txt")),
            PathBuf::from("text/lecture01.txt.partial")
        );
        assert_ne!(
            partial_path(Path::new("text/lecture01.txt")),
            partial_path(Path::new("text/lecture01.srt"))
        );
    }

    #[tokio::test]
    async fn test_sibling_artifacts_written_concurrently() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFsArtifactStorage::new(dir.path());

        let (text, transcript) = tokio::join!(
            storage.put_text("text/lecture01.txt", "Welcome to the course."),
            storage.put_text("text/lecture01.srt", "1\n00:00:00,000 --> 00:00:01,000\nWelcome.\n"),
        );
        text.unwrap();
        transcript.unwrap();

        assert_eq!(
            storage.get_text("text/lecture01.txt").await.unwrap(),
            "Welcome to the course."
        );
        assert_eq!(
            storage.get_text("text/lecture01.srt").await.unwrap(),
            "1\n00:00:00,000 --> 00:00:01,000\nWelcome.\n"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFsArtifactStorage::new(dir.path());

        assert!(!storage.exists("transcripts/x.srt").await.unwrap());
        let err = storage.get_text("transcripts/x.srt").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_locations() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFsArtifactStorage::new(dir.path());

        for location in ["../secret.txt", "/etc/passwd", ""] {
            let err = storage.get_text(location).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidLocation(_)), "{location}");
        }
    }

    #[tokio::test]
    async fn test_non_utf8_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.srt"), [0xff, 0xfe, 0x00]).unwrap();
        let storage = LocalFsArtifactStorage::new(dir.path());

        let err = storage.get_text("bad.srt").await.unwrap_err();
        assert!(matches!(err, StorageError::NotText(_)));
    }
}
