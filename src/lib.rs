//! Sitesift: crawl a website, clean each page with an LLM, package it for a knowledge base
//!
//! The crate is organised as a three-stage pipeline:
//! - [`crawler`] walks the site breadth-first and streams raw pages to disk
//! - [`transform`] rewrites each page through an LLM provider behind an adaptive
//!   rate-limit controller
//! - [`output`] stores pages as markdown with frontmatter and exports upload-ready text

pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod state;
pub mod storage;
pub mod transform;
pub mod url;

use thiserror::Error;

/// Main error type for Sitesift operations
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("The {stage} stage produced no output")]
    NothingProduced { stage: &'static str },
}

/// Configuration-specific errors
///
/// These are the only errors that abort the pipeline, and they are raised at
/// startup before any page is fetched or cleaned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid environment override {var}={value}")]
    InvalidOverride { var: String, value: String },

    #[error("Provider '{provider}' has no settings section")]
    MissingProvider { provider: String },

    #[error("Provider '{provider}' needs credentials: set {var}")]
    MissingCredential { provider: String, var: String },

    #[error("Provider '{provider}' is not reachable at {endpoint}")]
    ProviderUnavailable { provider: String, endpoint: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sitesift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlFrontier, CrawlRun, PageFetcher};
pub use output::{ArtifactWriter, Page};
pub use state::{RateLimitState, TaskStatus};
pub use transform::{ContentTransform, RateLimitController};
pub use url::{normalize_url, same_origin};
