//! Markdown page store
//!
//! One directory of `.md` files, one file per page, named after the page's
//! URL path.

use crate::output::traits::{ArtifactWriter, OutputError, OutputResult, Page};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use url::Url;

const MAX_FILENAME_CHARS: usize = 100;
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const STRIPPED_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".aspx", ".asp"];

/// Directory-backed page store
pub struct MarkdownStore {
    dir: PathBuf,

    /// File stems handed out by this store, so concurrent writers never collide
    claimed: Mutex<HashSet<String>>,
}

impl MarkdownStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if it does not exist
    pub fn prepare(&self) -> OutputResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Removes every file in the store and recreates the empty directory
    pub fn reset(&self) -> OutputResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        self.lock_claimed()?.clear();
        self.prepare()
    }

    /// Lists the store's markdown files in name order
    pub fn list_pages(&self) -> OutputResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }

    /// Reads and parses a page file
    pub fn read_page(path: &Path) -> OutputResult<Page> {
        let text = std::fs::read_to_string(path)?;
        Page::from_markdown(&text, path)
    }

    /// Writes a page under an explicit file name, replacing any existing file
    ///
    /// Used by the clean stage, which keeps the raw page's file name.
    pub fn write_named(&self, file_name: &str, page: &Page) -> OutputResult<PathBuf> {
        let path = self.dir.join(file_name);
        std::fs::write(&path, page.to_markdown())?;
        Ok(path)
    }

    /// Picks a free `.md` path for the given stem, appending `_N` on collision
    fn claim_path(&self, stem: &str) -> OutputResult<PathBuf> {
        let mut claimed = self.lock_claimed()?;

        let mut candidate = stem.to_string();
        let mut counter = 1;
        while claimed.contains(&candidate) || self.dir.join(format!("{}.md", candidate)).exists()
        {
            candidate = format!("{}_{}", stem, counter);
            counter += 1;
        }

        let path = self.dir.join(format!("{}.md", candidate));
        claimed.insert(candidate);
        Ok(path)
    }

    fn lock_claimed(&self) -> OutputResult<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.claimed
            .lock()
            .map_err(|_| OutputError::Write("file name registry lock poisoned".to_string()))
    }
}

impl ArtifactWriter for MarkdownStore {
    fn write(&self, page: &Page) -> OutputResult<PathBuf> {
        let stem = Url::parse(&page.url)
            .map(|url| sanitize_filename(&url))
            .unwrap_or_else(|_| "page".to_string());

        let path = self.claim_path(&stem)?;
        std::fs::write(&path, page.to_markdown())?;
        debug!("Wrote {} to {}", page.url, path.display());

        Ok(path)
    }
}

/// Derives a file stem from a URL path
///
/// - the root path becomes `index`
/// - `/` becomes `_`, and characters unsafe in file names become `_`
/// - a trailing `.html`, `.htm`, `.php`, `.asp` or `.aspx` is dropped
/// - the result is cut to 100 characters; an empty result becomes `page`
///
/// # Examples
///
/// ```
/// use sitesift::output::sanitize_filename;
/// use url::Url;
///
/// let url = Url::parse("https://example.org/events/calendar.html").unwrap();
/// assert_eq!(sanitize_filename(&url), "events_calendar");
/// ```
pub fn sanitize_filename(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "index".to_string();
    }

    let mut name: String = path
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let lower = name.to_ascii_lowercase();
    if let Some(ext) = STRIPPED_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext)) {
        name.truncate(name.len() - ext.len());
    }

    let name: String = name.chars().take(MAX_FILENAME_CHARS).collect();
    if name.is_empty() {
        "page".to_string()
    } else {
        name
    }
}
