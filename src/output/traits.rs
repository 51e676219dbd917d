//! Output traits and types
//!
//! This module defines the page type produced by the crawl and the trait
//! interface every page sink implements.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to parse page file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A crawled page
///
/// Externally a page is a markdown file whose frontmatter carries `source`
/// and `crawl_depth` (and `title` when known). Pages are never modified once
/// written; the clean stage writes a new page under the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Normalized URL the page was fetched from
    pub url: String,

    /// Link distance from the seed URL
    pub depth: u32,

    /// Document title, if the page had one
    pub title: Option<String>,

    /// Markdown body
    pub content: String,
}

impl Page {
    /// Returns a copy of this page with a different body
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}

/// Trait for page sinks
///
/// The crawler calls `write` once per accepted page, before the page is
/// yielded to the consumer, so an interrupted run leaves every yielded page
/// on disk. Implementations must be thread-safe.
pub trait ArtifactWriter: Send + Sync {
    /// Persists a page and returns where it was written
    fn write(&self, page: &Page) -> OutputResult<PathBuf>;
}
