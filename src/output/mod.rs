//! Output module for pages and upload artifacts
//!
//! This module handles:
//! - The markdown page format with its frontmatter header
//! - Directory-backed page stores for raw and cleaned pages
//! - Plain-text export with upload size checks
//! - Statistics read back from the run ledger

mod export;
mod markdown;
pub mod stats;
mod store;
mod traits;

pub use export::{export_text, ExportReport, ExportedFile};
pub use markdown::split_frontmatter;
pub use stats::{load_statistics, print_statistics, LedgerStatistics};
pub use store::{sanitize_filename, MarkdownStore};
pub use traits::{ArtifactWriter, OutputError, OutputResult, Page};
