//! Configuration module for Sitesift
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the LLM provider once at startup.
//!
//! # Example
//!
//! ```no_run
//! use sitesift::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitesift.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod provider;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackoffConfig, Config, CrawlerConfig, OutputConfig, ProviderKind, ProviderSection,
    ProvidersConfig, TransformConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, MAX_DEPTH_ENV,
    MAX_PAGES_ENV,
};
pub use provider::{resolve_provider, ResolvedProvider};

#[cfg(test)]
pub(crate) mod test_support {
    use super::Config;

    pub const SAMPLE_TOML: &str = r#"
[crawler]
seed-url = "https://www.example.org/"
max-depth = 3
max-pages = 100

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.org/about"
contact-email = "admin@example.org"

[output]
data-dir = "./data"
ledger-path = "./data/ledger.db"

[transform]
provider = "ollama"

[providers.ollama]
model = "llama3.2:3b"

[providers.anthropic]
model = "claude-3-5-haiku-latest"
api-key-env = "ANTHROPIC_API_KEY"

[providers.openrouter]
model = "google/gemma-3-27b-it:free"
api-key-env = "OPENROUTER_API_KEY"
"#;

    pub fn sample_config() -> Config {
        toml::from_str(SAMPLE_TOML).expect("sample config parses")
    }
}
