//! Plain-text export for knowledge-base upload
//!
//! Copies each cleaned markdown page to a `.txt` file and, when everything
//! fits under the upload limit, also writes one combined file.

use crate::output::traits::OutputResult;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One exported text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub name: String,
    pub bytes: u64,
}

/// Outcome of an export
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Exported files in name order
    pub files: Vec<ExportedFile>,

    /// Sum of all exported file sizes
    pub total_bytes: u64,

    /// Files larger than the upload limit
    pub oversized: Vec<ExportedFile>,

    /// Combined file, if it was written
    pub combined: Option<PathBuf>,
}

/// Exports cleaned markdown files as text
///
/// # Arguments
///
/// * `source_dir` - Directory holding cleaned `.md` files
/// * `txt_dir` - Destination for `.txt` copies; emptied first
/// * `combined_path` - Where the combined file goes
/// * `max_upload_bytes` - Per-file size limit of the knowledge base
pub fn export_text(
    source_dir: &Path,
    txt_dir: &Path,
    combined_path: &Path,
    max_upload_bytes: u64,
) -> OutputResult<ExportReport> {
    let mut report = ExportReport::default();

    let mut sources = Vec::new();
    if source_dir.exists() {
        for entry in std::fs::read_dir(source_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                sources.push(path);
            }
        }
    }
    sources.sort();

    if sources.is_empty() {
        return Ok(report);
    }

    if txt_dir.exists() {
        std::fs::remove_dir_all(txt_dir)?;
    }
    std::fs::create_dir_all(txt_dir)?;

    let mut parts = Vec::with_capacity(sources.len());
    for source in &sources {
        let content = std::fs::read_to_string(source)?;
        let target = txt_dir.join(source.with_extension("txt").file_name().unwrap_or_default());
        std::fs::write(&target, &content)?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = content.len() as u64;
        info!("Converted {} ({:.1} KB)", name, bytes as f64 / 1024.0);

        report.total_bytes += bytes;
        let file = ExportedFile { name, bytes };
        if bytes > max_upload_bytes {
            report.oversized.push(file.clone());
        }
        parts.push((file.name.clone(), content));
        report.files.push(file);
    }

    for file in &report.oversized {
        warn!(
            "{} is {:.2} MB, above the {:.2} MB upload limit",
            file.name,
            file.bytes as f64 / 1024.0 / 1024.0,
            max_upload_bytes as f64 / 1024.0 / 1024.0
        );
    }

    if report.total_bytes < max_upload_bytes {
        std::fs::write(combined_path, combine_parts(&parts))?;
        report.combined = Some(combined_path.to_path_buf());
    } else {
        if combined_path.exists() {
            std::fs::remove_file(combined_path)?;
        }
        warn!("Combined file would exceed the upload limit; upload the individual files instead");
    }

    Ok(report)
}

/// Joins named parts into the combined document
fn combine_parts(parts: &[(String, String)]) -> String {
    let separator = format!("\n\n{}\n\n", "=".repeat(80));
    parts
        .iter()
        .map(|(name, content)| format!("# Source: {}\n\n{}", name, content))
        .collect::<Vec<_>>()
        .join(&separator)
}
