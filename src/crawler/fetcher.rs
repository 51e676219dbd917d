//! Page fetching
//!
//! This module defines the [`PageFetcher`] seam the crawl is driven through,
//! and the bundled HTTP implementation:
//! - Building HTTP clients with proper user agent strings
//! - Per-origin robots.txt rules and crawl delay
//! - A politeness gap between consecutive requests
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::parser::parse_html;
use crate::robots::{fetch_robots, RobotsRules};
use crate::url::{normalize_url, same_origin};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Maximum number of redirects followed for one page
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Url,

    /// Page title, if any
    pub title: Option<String>,

    /// Main content as markdown
    pub content: String,

    /// Links found on the page, absolute and normalized, in document order
    pub links: Vec<Url>,
}

/// Why a page could not be fetched
///
/// Every variant is a per-page failure: the task is marked failed and the
/// crawl continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Not an HTML page (Content-Type: {content_type})")]
    NotHtml { content_type: String },

    #[error("No meaningful content ({chars} characters)")]
    EmptyContent { chars: usize },

    #[error("Disallowed by robots.txt")]
    RobotsDenied,

    #[error("Redirected to another origin: {target}")]
    OffOriginRedirect { target: String },
}

/// Source of pages for a crawl
///
/// The crawl only ever sees pages through this trait, so tests and
/// alternative renderers can stand in for the HTTP implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sitesift::config::UserAgentConfig;
/// use sitesift::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "sitesift".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches static HTML over HTTP
pub struct HttpFetcher {
    client: Client,

    /// Product token matched against robots.txt groups
    agent: String,

    respect_robots: bool,
    request_delay: Duration,

    /// robots.txt rules per origin
    robots: Mutex<HashMap<String, RobotsRules>>,

    /// Start of the previous request
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler.request_timeout())?;
        Ok(Self::with_client(
            client,
            &user_agent.crawler_name,
            crawler.respect_robots_txt,
            crawler.request_delay(),
        ))
    }

    pub fn with_client(
        client: Client,
        agent: &str,
        respect_robots: bool,
        request_delay: Duration,
    ) -> Self {
        Self {
            client,
            agent: agent.to_string(),
            respect_robots,
            request_delay,
            robots: Mutex::new(HashMap::new()),
            last_request: Mutex::new(None),
        }
    }

    /// Returns the robots.txt rules for the URL's origin, fetching them once
    async fn rules_for(&self, url: &Url) -> RobotsRules {
        let origin = url.origin().ascii_serialization();
        let mut cache = self.robots.lock().await;

        if let Some(rules) = cache.get(&origin) {
            return rules.clone();
        }

        let rules = fetch_robots(&self.client, url).await;
        cache.insert(origin, rules.clone());
        rules
    }

    /// Waits until the politeness gap since the previous request has passed
    async fn pace(&self, crawl_delay: Option<Duration>) {
        let gap = crawl_delay.map_or(self.request_delay, |d| d.max(self.request_delay));
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + gap).await;
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let crawl_delay = if self.respect_robots {
            let rules = self.rules_for(url).await;
            if !rules.is_allowed(url, &self.agent) {
                return Err(FetchError::RobotsDenied);
            }
            rules.crawl_delay(&self.agent)
        } else {
            None
        };

        self.pace(crawl_delay).await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(classify_network_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type {
            if !is_html(&content_type) {
                return Err(FetchError::NotHtml { content_type });
            }
        }

        let final_url = normalize_url(response.url().as_str()).unwrap_or_else(|_| url.clone());
        if final_url != *url {
            if !same_origin(url, &final_url) {
                return Err(FetchError::OffOriginRedirect {
                    target: final_url.to_string(),
                });
            }
            debug!("{} redirected to {}", url, final_url);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let parsed = parse_html(&body, &final_url);

        Ok(FetchedPage {
            final_url,
            title: parsed.title,
            content: parsed.markdown,
            links: parsed.links,
        })
    }
}

/// Returns true for HTML and XHTML content types
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn classify_network_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_redirect() {
        format!("Redirect error: {}", error)
    } else {
        error.to_string()
    }
}
