//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The breadth-first frontier with depth and page budgets
//! - HTTP fetching with robots.txt and politeness handling
//! - HTML parsing, link extraction and markdown rendering
//! - Overall crawl coordination, exposed as a stream of pages

mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{run_crawl, CrawlRun, CrawlStats};
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::{Admission, CrawlFrontier, CrawlTask};
pub use parser::{parse_html, ParsedPage};
