//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::TaskStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CleaningOutcome, CleaningRecord, RunRecord, RunStatus, Stage, TaskRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        stage: Stage::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Stage::Crawl),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, stage: Stage, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (stage, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                stage.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, stage, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, stage: Stage) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, stage, started_at, finished_at, config_hash, status FROM runs
                 WHERE stage = ?1 ORDER BY id DESC LIMIT 1",
                params![stage.to_db_string()],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Crawl Tasks =====

    fn record_task(&mut self, run_id: i64, task: &TaskRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_tasks (run_id, url, depth, parent_url, status, error_message, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(run_id, url) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at",
            params![
                run_id,
                task.url,
                task.depth,
                task.parent_url,
                task.status.to_db_string(),
                task.error_message,
                now
            ],
        )?;
        Ok(())
    }

    fn get_tasks(&self, run_id: i64) -> StorageResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, depth, parent_url, status, error_message FROM crawl_tasks
             WHERE run_id = ?1 ORDER BY id",
        )?;

        let tasks = stmt
            .query_map(params![run_id], |row| {
                Ok(TaskRecord {
                    url: row.get(0)?,
                    depth: row.get(1)?,
                    parent_url: row.get(2)?,
                    status: TaskStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(TaskStatus::Failed),
                    error_message: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn count_tasks_by_status(&self, run_id: i64) -> StorageResult<HashMap<TaskStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM crawl_tasks WHERE run_id = ?1 GROUP BY status",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = TaskStatus::from_db_string(&status) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM crawl_tasks
             WHERE run_id = ?1 AND status = ?2
             GROUP BY depth ORDER BY depth",
        )?;

        let rows = stmt.query_map(
            params![run_id, TaskStatus::Fetched.to_db_string()],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }

    // ===== Cleanings =====

    fn record_cleaning(&mut self, run_id: i64, cleaning: &CleaningRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cleanings (run_id, url, file_name, outcome, error_message, input_chars, output_chars, cleaned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                cleaning.url,
                cleaning.file_name,
                cleaning.outcome.to_db_string(),
                cleaning.error_message,
                cleaning.input_chars as i64,
                cleaning.output_chars.map(|c| c as i64),
                now
            ],
        )?;
        Ok(())
    }

    fn get_cleanings(&self, run_id: i64) -> StorageResult<Vec<CleaningRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, file_name, outcome, error_message, input_chars, output_chars
             FROM cleanings WHERE run_id = ?1 ORDER BY id",
        )?;

        let cleanings = stmt
            .query_map(params![run_id], |row| {
                Ok(CleaningRecord {
                    url: row.get(0)?,
                    file_name: row.get(1)?,
                    outcome: CleaningOutcome::from_db_string(&row.get::<_, String>(2)?)
                        .unwrap_or(CleaningOutcome::Failed),
                    error_message: row.get(3)?,
                    input_chars: row.get::<_, i64>(4)? as u64,
                    output_chars: row.get::<_, Option<i64>>(5)?.map(|c| c as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cleanings)
    }

    fn count_cleanings_by_outcome(
        &self,
        run_id: i64,
    ) -> StorageResult<HashMap<CleaningOutcome, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT outcome, COUNT(*) FROM cleanings WHERE run_id = ?1 GROUP BY outcome",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (outcome, count) = row?;
            if let Some(outcome) = CleaningOutcome::from_db_string(&outcome) {
                counts.insert(outcome, count as u64);
            }
        }

        Ok(counts)
    }
}
