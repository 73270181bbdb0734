//! In-memory execution store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{check_save, ExecutionStore, SaveCheck};
use crate::core::{ExecutionId, ExecutionStatus, WorkflowExecution};
use crate::errors::StoreError;

/// Execution store backed by a map. Records do not survive the process.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save(&self, execution: &mut WorkflowExecution) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let id = execution.execution_id();

        match check_save(records.get(&id), execution)? {
            SaveCheck::Unchanged => Ok(()),
            SaveCheck::Write(version) => {
                execution.mark_saved(version);
                records.insert(id, execution.clone());
                Ok(())
            }
        }
    }

    async fn load(&self, id: ExecutionId) -> Result<WorkflowExecution, StoreError> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionId>, StoreError> {
        let mut ids: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|e| e.status() == status)
            .map(WorkflowExecution::execution_id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
