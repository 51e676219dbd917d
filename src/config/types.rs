use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sitesift
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub transform: TransformConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// URL the breadth-first crawl starts from
    pub seed_url: String,

    /// Maximum link distance from the seed URL
    pub max_depth: u32,

    /// Maximum number of pages accepted in one run
    pub max_pages: u32,

    /// Maximum number of concurrent page fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pages whose extracted content is shorter than this are treated as failed
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Minimum time between two requests to the site (milliseconds)
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_crawl_timeout")]
    pub request_timeout_secs: u64,

    /// Whether robots.txt rules are honoured
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory holding raw/, cleaned/, txt/ and the combined file
    pub data_dir: String,

    /// Path to the SQLite run ledger
    pub ledger_path: String,

    /// Size ceiling of a single upload file (bytes)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl OutputConfig {
    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("raw")
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("cleaned")
    }

    pub fn txt_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("txt")
    }

    pub fn combined_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("combined_knowledge_base.txt")
    }
}

/// LLM transform configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransformConfig {
    /// Provider used when `--provider` is not given
    pub provider: ProviderKind,

    /// Inputs longer than this many characters are truncated before submission
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Upper bound on generated tokens requested from the provider
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Cleaned results shorter than this are discarded
    #[serde(default = "default_min_output_chars")]
    pub min_output_chars: usize,

    /// Consecutive non-rate-limit failures tolerated per page
    #[serde(default = "default_max_provider_errors")]
    pub max_provider_errors: u32,

    /// Number of pages cleaned concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_transform_timeout")]
    pub request_timeout_secs: u64,

    /// Prompt prefixed to every page; a neutral default is used when absent
    #[serde(default)]
    pub instructions: Option<String>,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Backoff tuning for the rate-limit controller
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackoffConfig {
    /// First fallback wait when the provider gives no duration (milliseconds)
    pub base_ms: u64,

    /// Upper bound on any single wait (milliseconds)
    pub ceiling_ms: u64,

    /// Lowest pacing interval between calls (milliseconds)
    pub floor_ms: u64,

    /// Consecutive successes after which the interval returns to the floor
    pub reset_after_successes: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 10_000,
            ceiling_ms: 300_000,
            floor_ms: 0,
            reset_after_successes: 5,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// Anthropic messages API
    Anthropic,
    /// OpenRouter (OpenAI-compatible chat completions)
    Openrouter,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
            Self::Openrouter => "openrouter",
        }
    }

    /// Endpoint used when the provider section does not set `base-url`
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Openrouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    pub ollama: Option<ProviderSection>,
    pub anthropic: Option<ProviderSection>,
    pub openrouter: Option<ProviderSection>,
}

impl ProvidersConfig {
    pub fn section(&self, kind: ProviderKind) -> Option<&ProviderSection> {
        match kind {
            ProviderKind::Ollama => self.ollama.as_ref(),
            ProviderKind::Anthropic => self.anthropic.as_ref(),
            ProviderKind::Openrouter => self.openrouter.as_ref(),
        }
    }
}

/// Model, endpoint and credential source for one provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderSection {
    pub model: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_concurrency() -> u32 {
    1
}

fn default_min_content_chars() -> usize {
    50
}

fn default_crawl_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_input_chars() -> usize {
    12_000
}

fn default_max_output_tokens() -> u32 {
    4000
}

fn default_min_output_chars() -> usize {
    20
}

fn default_max_provider_errors() -> u32 {
    3
}

fn default_transform_timeout() -> u64 {
    120
}
