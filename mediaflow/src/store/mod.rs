//! Durable execution records.
//!
//! The store is the only state shared between concurrently running
//! executions. Each record carries a `version` counter: a save is rejected
//! when the stored version moved since the caller loaded the record, which
//! guards against two tasks racing on the same execution.

mod file;
mod memory;

use async_trait::async_trait;

use crate::core::{ExecutionId, ExecutionStatus, WorkflowExecution};
use crate::errors::StoreError;

pub use file::JsonFileExecutionStore;
pub use memory::InMemoryExecutionStore;

/// Persistence for workflow executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Saves the record and bumps its version on success.
    ///
    /// Saving an unchanged terminal record again is a no-op.
    async fn save(&self, execution: &mut WorkflowExecution) -> Result<(), StoreError>;

    /// Loads a record, including any in-flight stage attempt.
    async fn load(&self, id: ExecutionId) -> Result<WorkflowExecution, StoreError>;

    /// Lists the ids of records with the given status, oldest first.
    async fn list_by_status(&self, status: ExecutionStatus) -> Result<Vec<ExecutionId>, StoreError>;
}

/// Outcome of checking a save against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveCheck {
    /// Write the record with this version.
    Write(u64),
    /// The stored terminal record is identical; nothing to write.
    Unchanged,
}

fn check_save(
    stored: Option<&WorkflowExecution>,
    incoming: &WorkflowExecution,
) -> Result<SaveCheck, StoreError> {
    let id = incoming.execution_id();
    let found = stored.map_or(0, WorkflowExecution::version);

    if found != incoming.version() {
        return Err(StoreError::VersionConflict {
            id,
            expected: incoming.version(),
            found,
        });
    }

    if let Some(stored) = stored.filter(|s| s.is_terminal()) {
        if stored == incoming {
            return Ok(SaveCheck::Unchanged);
        }
        return Err(StoreError::AlreadyTerminal {
            id,
            status: stored.status(),
        });
    }

    Ok(SaveCheck::Write(found + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_gets_version_one() {
        let exec = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        assert_eq!(check_save(None, &exec).unwrap(), SaveCheck::Write(1));
    }

    #[test]
    fn test_stale_version_conflicts() {
        let mut stored = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        stored.mark_saved(3);
        let mut incoming = stored.clone();
        incoming.mark_saved(2);

        assert!(matches!(
            check_save(Some(&stored), &incoming),
            Err(StoreError::VersionConflict { expected: 2, found: 3, .. })
        ));
    }
}
