//! Clean stage
//!
//! Reads every raw page, sends its body through the rate-limit controller and
//! writes the cleaned page under the same file name. A page that cannot be
//! cleaned is recorded and left out; its raw file stays on disk.

use crate::output::{MarkdownStore, OutputResult};
use crate::storage::{CleaningOutcome, CleaningRecord, Ledger};
use crate::transform::RateLimitController;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Raw bodies shorter than this are not worth a provider call
pub const MIN_BODY_CHARS: usize = 50;

/// Tally of one clean run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub total: usize,
    pub cleaned: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Cleans every page of `raw` into `cleaned`
///
/// `cleaned` is emptied first. Up to `concurrency` pages are in progress at
/// once; they all share the controller's pacing.
///
/// # Arguments
///
/// * `raw` - Store holding the crawled pages
/// * `cleaned` - Destination store
/// * `controller` - Rate-limited transform
/// * `min_output_chars` - Cleaned results shorter than this are rejected
/// * `concurrency` - Pages cleaned at the same time
/// * `ledger` - Run ledger to record outcomes in, if any
pub async fn clean_pages(
    raw: &MarkdownStore,
    cleaned: &MarkdownStore,
    controller: &RateLimitController,
    min_output_chars: usize,
    concurrency: usize,
    ledger: Option<&Ledger>,
) -> OutputResult<CleanReport> {
    let files = raw.list_pages()?;
    cleaned.reset()?;

    info!(
        "Cleaning {} pages from {} with {}",
        files.len(),
        raw.dir().display(),
        controller.provider_name()
    );

    let total = files.len();
    let mut report = CleanReport {
        total,
        ..CleanReport::default()
    };

    let mut outcomes = stream::iter(files)
        .map(|path| clean_one(path, cleaned, controller, min_output_chars))
        .buffer_unordered(concurrency.max(1));

    let mut done = 0;
    while let Some(record) = outcomes.next().await {
        done += 1;
        match record.outcome {
            CleaningOutcome::Cleaned => {
                report.cleaned += 1;
                info!(
                    "[{}/{}] Cleaned {} ({} -> {} chars)",
                    done,
                    total,
                    record.file_name,
                    record.input_chars,
                    record.output_chars.unwrap_or_default()
                );
            }
            CleaningOutcome::Skipped => {
                report.skipped += 1;
                info!("[{}/{}] Skipped {} (too short)", done, total, record.file_name);
            }
            CleaningOutcome::Failed => {
                report.failed += 1;
                warn!(
                    "[{}/{}] Failed to clean {}: {}",
                    done,
                    total,
                    record.file_name,
                    record.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }

        if let Some(ledger) = ledger {
            ledger.record_cleaning(&record);
        }
    }

    info!(
        "Cleaned {}/{} pages ({} skipped, {} failed)",
        report.cleaned, report.total, report.skipped, report.failed
    );

    Ok(report)
}

async fn clean_one(
    path: PathBuf,
    cleaned: &MarkdownStore,
    controller: &RateLimitController,
    min_output_chars: usize,
) -> CleaningRecord {
    let file_name = file_name(&path);

    let page = match MarkdownStore::read_page(&path) {
        Ok(page) => page,
        Err(e) => {
            return CleaningRecord {
                url: String::new(),
                file_name,
                outcome: CleaningOutcome::Failed,
                error_message: Some(e.to_string()),
                input_chars: 0,
                output_chars: None,
            }
        }
    };

    let input_chars = page.content.chars().count();
    let mut record = CleaningRecord {
        url: page.url.clone(),
        file_name,
        outcome: CleaningOutcome::Failed,
        error_message: None,
        input_chars: input_chars as u64,
        output_chars: None,
    };

    if page.content.trim().chars().count() < MIN_BODY_CHARS {
        record.outcome = CleaningOutcome::Skipped;
        return record;
    }

    let output = match controller.transform(&page.content).await {
        Ok(output) => output,
        Err(e) => {
            record.error_message = Some(e.to_string());
            return record;
        }
    };

    let output = output.trim();
    let output_chars = output.chars().count();
    record.output_chars = Some(output_chars as u64);

    if output_chars < min_output_chars {
        record.error_message = Some(format!("result too short ({} chars)", output_chars));
        return record;
    }

    match cleaned.write_named(&record.file_name, &page.with_content(output)) {
        Ok(_) => record.outcome = CleaningOutcome::Cleaned,
        Err(e) => record.error_message = Some(e.to_string()),
    }

    record
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
