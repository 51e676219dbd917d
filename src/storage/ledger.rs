//! Run-scoped handle on the ledger
//!
//! Ledger writes never fail a run: errors are logged and the pipeline
//! carries on.

use crate::storage::{
    CleaningRecord, RunStatus, SqliteStorage, Stage, Storage, StorageError, StorageResult,
    TaskRecord,
};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Records one run's progress into shared storage
#[derive(Clone)]
pub struct Ledger {
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl Ledger {
    /// Opens a new run for the given stage
    pub fn start(
        storage: Arc<Mutex<SqliteStorage>>,
        stage: Stage,
        config_hash: &str,
    ) -> StorageResult<Self> {
        let run_id = storage
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .create_run(stage, config_hash)?;

        Ok(Self { storage, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn record_task(&self, task: &TaskRecord) {
        let result = self.with_storage(|storage| storage.record_task(self.run_id, task));
        if let Err(e) = result {
            warn!("Failed to record crawl task {} in ledger: {}", task.url, e);
        }
    }

    pub fn record_cleaning(&self, cleaning: &CleaningRecord) {
        let result = self.with_storage(|storage| storage.record_cleaning(self.run_id, cleaning));
        if let Err(e) = result {
            warn!(
                "Failed to record cleaning of {} in ledger: {}",
                cleaning.file_name, e
            );
        }
    }

    pub fn finish(&self, status: RunStatus) {
        let result = self.with_storage(|storage| storage.finish_run(self.run_id, status));
        if let Err(e) = result {
            warn!("Failed to finish run {} in ledger: {}", self.run_id, e);
        }
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskStatus;

    #[test]
    fn test_ledger_records_into_its_run() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let ledger = Ledger::start(storage.clone(), Stage::Crawl, "abc").unwrap();

        ledger.record_task(&TaskRecord {
            url: "https://example.org/".to_string(),
            depth: 0,
            parent_url: None,
            status: TaskStatus::Fetched,
            error_message: None,
        });
        ledger.finish(RunStatus::Completed);

        let storage = storage.lock().unwrap();
        let run = storage.get_run(ledger.run_id()).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.config_hash, "abc");
        assert_eq!(storage.get_tasks(ledger.run_id()).unwrap().len(), 1);
    }
}
