//! Provider resolution
//!
//! The provider is chosen once at startup, either from the configuration file or
//! from the `--provider` flag, and turned into a fully validated
//! [`ResolvedProvider`] before any page-level work begins.

use crate::config::types::{Config, ProviderKind};
use crate::ConfigError;
use url::Url;

/// A provider with its endpoint, model and credentials resolved
#[derive(Clone)]
pub struct ResolvedProvider {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: Url,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolves the provider to use for the clean stage
///
/// # Arguments
///
/// * `config` - The loaded configuration
/// * `selected` - Provider chosen on the command line, overriding the file
///
/// # Returns
///
/// * `Ok(ResolvedProvider)` - Settings ready to build a client from
/// * `Err(ConfigError)` - Missing section, bad endpoint or missing credentials
pub fn resolve_provider(
    config: &Config,
    selected: Option<ProviderKind>,
) -> Result<ResolvedProvider, ConfigError> {
    let kind = selected.unwrap_or(config.transform.provider);
    let section = config
        .providers
        .section(kind)
        .ok_or_else(|| ConfigError::MissingProvider {
            provider: kind.to_string(),
        })?;

    if section.model.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "providers.{}.model cannot be empty",
            kind
        )));
    }

    let base = section
        .base_url
        .as_deref()
        .unwrap_or_else(|| kind.default_base_url());
    let base_url = Url::parse(base)
        .map_err(|e| ConfigError::InvalidUrl(format!("providers.{}.base-url: {}", kind, e)))?;

    let api_key = match kind {
        ProviderKind::Ollama => None,
        ProviderKind::Anthropic | ProviderKind::Openrouter => {
            let var = section
                .api_key_env
                .clone()
                .unwrap_or_else(|| default_key_var(kind).to_string());
            match std::env::var(&var) {
                Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
                _ => {
                    return Err(ConfigError::MissingCredential {
                        provider: kind.to_string(),
                        var,
                    })
                }
            }
        }
    };

    Ok(ResolvedProvider {
        kind,
        model: section.model.clone(),
        base_url,
        api_key,
    })
}

fn default_key_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Ollama => "OLLAMA_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Openrouter => "OPENROUTER_API_KEY",
    }
}
