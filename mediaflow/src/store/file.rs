//! JSON file execution store.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{check_save, ExecutionStore, SaveCheck};
use crate::core::{ExecutionId, ExecutionStatus, WorkflowExecution};
use crate::errors::StoreError;

const EXTENSION: &str = "json";

/// Execution store keeping one pretty-printed JSON document per execution.
///
/// Writes go to a temporary file that is renamed over the record, so a
/// crash never leaves a half-written record behind. Status lookups scan the
/// directory.
#[derive(Debug)]
pub struct JsonFileExecutionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileExecutionStore {
    /// Opens a store in `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ExecutionId) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    async fn read(path: &Path) -> Result<Option<WorkflowExecution>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ExecutionStore for JsonFileExecutionStore {
    async fn save(&self, execution: &mut WorkflowExecution) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(execution.execution_id());
        let stored = Self::read(&path).await?;

        let SaveCheck::Write(version) = check_save(stored.as_ref(), execution)? else {
            return Ok(());
        };

        let mut record = execution.clone();
        record.mark_saved(version);
        let json = serde_json::to_vec_pretty(&record)?;

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        execution.mark_saved(version);
        Ok(())
    }

    async fn load(&self, id: ExecutionId) -> Result<WorkflowExecution, StoreError> {
        Self::read(&self.path_for(id))
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(record) = Self::read(&path).await? {
                if record.status() == status {
                    ids.push(record.execution_id());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageResult;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let mut exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        exec.record(StageResult::in_flight("transcode", 1).with_provider_job("job-1"))
            .unwrap();

        {
            let store = JsonFileExecutionStore::open(dir.path()).await.unwrap();
            store.save(&mut exec).await.unwrap();
        }

        let store = JsonFileExecutionStore::open(dir.path()).await.unwrap();
        let loaded = store.load(exec.execution_id()).await.unwrap();
        assert_eq!(loaded, exec);
        assert_eq!(
            store.list_by_status(ExecutionStatus::Running).await.unwrap(),
            vec![exec.execution_id()]
        );
    }

    #[tokio::test]
    async fn test_no_temp_files_left() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileExecutionStore::open(dir.path()).await.unwrap();
        let mut exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        store.save(&mut exec).await.unwrap();
        exec.advance_stage().unwrap();
        store.save(&mut exec).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.json", exec.execution_id())]);
        assert_eq!(exec.version(), 2);
    }

    #[tokio::test]
    async fn test_stale_save_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileExecutionStore::open(dir.path()).await.unwrap();
        let mut exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        store.save(&mut exec).await.unwrap();

        let mut stale = exec.clone();
        exec.advance_stage().unwrap();
        store.save(&mut exec).await.unwrap();

        stale.finish(ExecutionStatus::Cancelled).unwrap();
        assert!(matches!(
            store.save(&mut stale).await,
            Err(StoreError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileExecutionStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.load(ExecutionId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
