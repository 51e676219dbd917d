use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `crawler.max-depth`
pub const MAX_DEPTH_ENV: &str = "MAX_CRAWL_DEPTH";

/// Environment variable overriding `crawler.max-pages`
pub const MAX_PAGES_ENV: &str = "MAX_PAGES";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation, so
/// an override is held to the same rules as a value written in the file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sitesift::config::load_config;
///
/// let config = load_config(Path::new("sitesift.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate(&config)?;

    Ok(config)
}

/// Applies `MAX_CRAWL_DEPTH` / `MAX_PAGES` overrides
///
/// The lookup is injected so tests do not depend on the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(MAX_DEPTH_ENV) {
        config.crawler.max_depth =
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    var: MAX_DEPTH_ENV.to_string(),
                    value: value.clone(),
                })?;
    }

    if let Some(value) = lookup(MAX_PAGES_ENV) {
        config.crawler.max_pages =
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    var: MAX_PAGES_ENV.to_string(),
                    value: value.clone(),
                })?;
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is recorded with every run in the ledger so runs made with different
/// settings can be told apart.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
