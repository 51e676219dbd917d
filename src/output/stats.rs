//! Statistics from the run ledger
//!
//! This module extracts and displays what the latest crawl and clean runs did.

use crate::state::TaskStatus;
use crate::storage::{CleaningOutcome, RunRecord, Stage, Storage, StorageResult};
use std::collections::{BTreeMap, HashMap};

/// Breakdown of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlRunStatistics {
    pub run: RunRecord,

    /// Count of tasks by final status
    pub tasks_by_status: HashMap<TaskStatus, u64>,

    /// Fetched pages per depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Failed URLs with their error messages
    pub failures: Vec<(String, String)>,
}

impl CrawlRunStatistics {
    pub fn total_tasks(&self) -> u64 {
        self.tasks_by_status.values().sum()
    }

    pub fn count(&self, status: TaskStatus) -> u64 {
        self.tasks_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Breakdown of one clean run
#[derive(Debug, Clone)]
pub struct CleanRunStatistics {
    pub run: RunRecord,

    /// Count of pages by cleaning outcome
    pub by_outcome: HashMap<CleaningOutcome, u64>,

    /// Total characters sent to and received from the provider
    pub input_chars: u64,
    pub output_chars: u64,

    /// Files that failed with their error messages
    pub failures: Vec<(String, String)>,
}

impl CleanRunStatistics {
    pub fn count(&self, outcome: CleaningOutcome) -> u64 {
        self.by_outcome.get(&outcome).copied().unwrap_or(0)
    }
}

/// Statistics for the latest run of each stage
#[derive(Debug, Clone, Default)]
pub struct LedgerStatistics {
    pub crawl: Option<CrawlRunStatistics>,
    pub clean: Option<CleanRunStatistics>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The ledger backend to query
///
/// # Returns
///
/// * `Ok(LedgerStatistics)` - Statistics for whichever stages have run
/// * `Err(StorageError)` - Failed to query the ledger
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<LedgerStatistics> {
    let crawl = match storage.get_latest_run(Stage::Crawl)? {
        Some(run) => {
            let failures = storage
                .get_tasks(run.id)?
                .into_iter()
                .filter(|task| task.status == TaskStatus::Failed)
                .map(|task| (task.url, task.error_message.unwrap_or_default()))
                .collect();

            Some(CrawlRunStatistics {
                tasks_by_status: storage.count_tasks_by_status(run.id)?,
                depth_breakdown: storage.get_depth_breakdown(run.id)?,
                failures,
                run,
            })
        }
        None => None,
    };

    let clean = match storage.get_latest_run(Stage::Clean)? {
        Some(run) => {
            let cleanings = storage.get_cleanings(run.id)?;
            let input_chars = cleanings.iter().map(|c| c.input_chars).sum();
            let output_chars = cleanings.iter().filter_map(|c| c.output_chars).sum();
            let failures = cleanings
                .into_iter()
                .filter(|c| c.outcome == CleaningOutcome::Failed)
                .map(|c| (c.file_name, c.error_message.unwrap_or_default()))
                .collect();

            Some(CleanRunStatistics {
                by_outcome: storage.count_cleanings_by_outcome(run.id)?,
                input_chars,
                output_chars,
                failures,
                run,
            })
        }
        None => None,
    };

    Ok(LedgerStatistics { crawl, clean })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Sitesift Statistics ===\n");

    match &stats.crawl {
        Some(crawl) => print_crawl(crawl),
        None => println!("No crawl runs recorded.\n"),
    }

    match &stats.clean {
        Some(clean) => print_clean(clean),
        None => println!("No clean runs recorded.\n"),
    }
}

fn print_run_header(title: &str, run: &RunRecord) {
    println!("{} (run {}):", title, run.id);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Status: {}", run.status.to_db_string());
    println!("  Config hash: {}", run.config_hash);
}

fn print_crawl(crawl: &CrawlRunStatistics) {
    print_run_header("Latest crawl", &crawl.run);

    let total = crawl.total_tasks();
    println!("  Tasks: {}", total);
    for status in [
        TaskStatus::Fetched,
        TaskStatus::Failed,
        TaskStatus::Skipped,
        TaskStatus::Pending,
    ] {
        let count = crawl.count(status);
        if count == 0 {
            continue;
        }
        let percentage = (count as f64 / total as f64) * 100.0;
        println!("    {}: {} ({:.1}%)", status, count, percentage);
    }

    if !crawl.depth_breakdown.is_empty() {
        println!("  Pages by depth:");
        for (depth, count) in &crawl.depth_breakdown {
            println!("    {}: {}", depth, count);
        }
    }

    if !crawl.failures.is_empty() {
        println!("  Failed URLs ({}):", crawl.failures.len());
        for (url, error) in &crawl.failures {
            println!("    - {} ({})", url, error);
        }
    }
    println!();
}

fn print_clean(clean: &CleanRunStatistics) {
    print_run_header("Latest clean", &clean.run);

    println!(
        "  Cleaned: {}  Skipped: {}  Failed: {}",
        clean.count(CleaningOutcome::Cleaned),
        clean.count(CleaningOutcome::Skipped),
        clean.count(CleaningOutcome::Failed)
    );
    println!(
        "  Characters in/out: {} / {}",
        clean.input_chars, clean.output_chars
    );

    if !clean.failures.is_empty() {
        println!("  Failed files ({}):", clean.failures.len());
        for (file, error) in &clean.failures {
            println!("    - {} ({})", file, error);
        }
    }
    println!();
}
