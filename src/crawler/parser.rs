//! HTML parser for extracting links, title and page content
//!
//! This module turns a fetched HTML document into:
//! - the links to consider for scheduling (absolute, normalized, deduplicated)
//! - the page title
//! - the page's main content as markdown

use crate::url::resolve_link;
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements dropped from the markdown rendering
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "header", "footer",
];

/// Containers tried, in order, for the page's main content
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role='main']", "body"];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Links found on the page, in document order, without duplicates
    pub links: Vec<Url>,

    /// Main content rendered as markdown
    pub markdown: String,
}

/// Parses HTML content and extracts links, title and markdown content
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - fragment-only links (same page anchors)
/// - `javascript:`, `mailto:`, `tel:`, `data:` and any other non-HTTP(S) link
///
/// Links are resolved against `base_url` and normalized, so two spellings of
/// one page collapse into a single entry.
///
/// # Example
///
/// ```
/// use sitesift::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        markdown: extract_markdown(&document),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        if let Ok(url) = resolve_link(base_url, href) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}

/// Renders the main content container as markdown
fn extract_markdown(document: &Html) -> String {
    let content_html = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next().map(|el| el.html()))
        .unwrap_or_else(|| document.root_element().html());

    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    match converter.convert(&content_html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(_) => {
            // Fallback: plain text of the container
            let fragment = Html::parse_fragment(&content_html);
            fragment
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}
