//! Storage traits and error types
//!
//! This module defines the trait interface for the run ledger backend and
//! associated error types.

use crate::state::TaskStatus;
use crate::storage::{CleaningOutcome, CleaningRecord, RunRecord, RunStatus, Stage, TaskRecord};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for run ledger backends
///
/// Records are written incrementally while a stage runs, so a ledger read
/// after an interrupted run shows everything up to the interruption.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run for a stage
    ///
    /// # Arguments
    ///
    /// * `stage` - The pipeline stage being run
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, stage: Stage, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a stage
    fn get_latest_run(&self, stage: Stage) -> StorageResult<Option<RunRecord>>;

    /// Sets a run's final status and finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Crawl Tasks =====

    /// Inserts a crawl task or updates it if the URL is already recorded for the run
    fn record_task(&mut self, run_id: i64, task: &TaskRecord) -> StorageResult<()>;

    /// Gets all tasks of a run in insertion order
    fn get_tasks(&self, run_id: i64) -> StorageResult<Vec<TaskRecord>>;

    /// Counts a run's tasks per status
    fn count_tasks_by_status(&self, run_id: i64) -> StorageResult<HashMap<TaskStatus, u64>>;

    /// Counts a run's fetched pages per depth
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>>;

    // ===== Cleanings =====

    /// Records the outcome of cleaning one page
    fn record_cleaning(&mut self, run_id: i64, cleaning: &CleaningRecord) -> StorageResult<()>;

    /// Gets all cleaning records of a run in insertion order
    fn get_cleanings(&self, run_id: i64) -> StorageResult<Vec<CleaningRecord>>;

    /// Counts a run's cleanings per outcome
    fn count_cleanings_by_outcome(
        &self,
        run_id: i64,
    ) -> StorageResult<HashMap<CleaningOutcome, u64>>;
}
