//! Storage module for the run ledger
//!
//! This module records what each pipeline run did:
//! - one row per stage run (crawl, clean, export) with its config hash and status
//! - every crawl task with its depth, parent and final status
//! - every cleaning outcome with input and output sizes

mod ledger;
mod schema;
mod sqlite;
mod traits;

pub use ledger::Ledger;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::TaskStatus;
use std::path::Path;

/// Opens the ledger database, creating it and its parent directory if needed
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// Pipeline stage a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Crawl,
    Clean,
    Export,
}

impl Stage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Clean => "clean",
            Self::Export => "export",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "crawl" => Some(Self::Crawl),
            "clean" => Some(Self::Clean),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub stage: Stage,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents a crawl task in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub status: TaskStatus,
    pub error_message: Option<String>,
}

/// Result of cleaning one raw page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleaningOutcome {
    /// Cleaned page written
    Cleaned,
    /// Raw body too short to be worth cleaning
    Skipped,
    /// Provider error or unusable result; the raw page stays on disk
    Failed,
}

impl CleaningOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Cleaned => "cleaned",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "cleaned" => Some(Self::Cleaned),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents a cleaning outcome in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningRecord {
    pub url: String,
    pub file_name: String,
    pub outcome: CleaningOutcome,
    pub error_message: Option<String>,
    pub input_chars: u64,
    pub output_chars: Option<u64>,
}
