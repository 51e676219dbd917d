//! Markdown page format
//!
//! Pages are stored as markdown with a small frontmatter header:
//!
//! ```text
//! ---
//! source: https://example.org/about
//! crawl_depth: 1
//! title: About us
//! ---
//!
//! body...
//! ```

use crate::output::traits::{OutputError, OutputResult, Page};
use std::path::Path;

const DELIMITER: &str = "---";

impl Page {
    /// Formats the page as markdown with its frontmatter header
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(DELIMITER);
        md.push('\n');
        md.push_str(&format!("source: {}\n", self.url));
        md.push_str(&format!("crawl_depth: {}\n", self.depth));
        if let Some(title) = &self.title {
            // frontmatter values are single-line
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
            if !title.is_empty() {
                md.push_str(&format!("title: {}\n", title));
            }
        }
        md.push_str(DELIMITER);
        md.push_str("\n\n");
        md.push_str(&self.content);

        md
    }

    /// Parses a page previously written with [`Page::to_markdown`]
    ///
    /// # Arguments
    ///
    /// * `text` - Full file content
    /// * `path` - File the content came from, used in error messages
    pub fn from_markdown(text: &str, path: &Path) -> OutputResult<Self> {
        let format_error = |reason: &str| OutputError::Format {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let (frontmatter, body) =
            split_frontmatter(text).ok_or_else(|| format_error("missing frontmatter"))?;

        let mut url = None;
        let mut depth = None;
        let mut title = None;

        for line in frontmatter.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "source" => url = Some(value.to_string()),
                "crawl_depth" => {
                    depth = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| format_error("crawl_depth is not a number"))?,
                    )
                }
                "title" if !value.is_empty() => title = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            url: url.ok_or_else(|| format_error("missing source"))?,
            depth: depth.ok_or_else(|| format_error("missing crawl_depth"))?,
            title,
            content: body.trim().to_string(),
        })
    }
}

/// Splits a document into its frontmatter block and body
///
/// Returns None if the document does not open with a `---` delimited block.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(DELIMITER)?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let frontmatter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((frontmatter, body));
        }
        offset += line.len();
    }

    None
}
