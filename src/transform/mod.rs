//! LLM content transformation
//!
//! This module contains everything between a raw page body and its cleaned
//! rewrite:
//! - The [`ContentTransform`] seam every provider implements
//! - [`RateLimitController`], which paces calls and absorbs rate limits
//! - Extraction of provider-reported retry durations
//! - The bundled chat providers (Ollama, Anthropic, OpenRouter)

mod controller;
mod providers;
mod retry_after;

pub use controller::RateLimitController;
pub use providers::{check_available, ChatProvider, DEFAULT_INSTRUCTIONS};
pub use retry_after::{MessagePatternExtractor, RetryAfterExtractor};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Appended to input that was cut to fit the provider's context
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// Rate-limit information reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// Wait taken from a structured field such as the `Retry-After` header
    pub retry_after: Option<Duration>,

    /// Provider's error text, which may mention a wait in prose
    pub message: Option<String>,
}

/// Why a single provider call did not produce cleaned content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformFailure {
    RateLimited(RateLimitSignal),
    Provider(String),
    ContentTooLarge(String),
}

/// Rewrites page content, usually through an LLM
#[async_trait]
pub trait ContentTransform: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Makes one attempt at cleaning `text`
    async fn clean(&self, text: &str) -> Result<String, TransformFailure>;
}

/// Kind of a failed transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    RateLimited,
    ProviderError,
    ContentTooLarge,
}

/// A transformation that gave up
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub message: String,
}

impl TransformError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self {
            kind: TransformErrorKind::ProviderError,
            message: message.into(),
        }
    }
}

/// Cuts `text` to at most `max_chars` characters
///
/// Text that fits is returned unchanged. Longer text keeps a prefix followed by
/// [`TRUNCATION_MARKER`] so the result is exactly `max_chars` characters long;
/// truncating the result again is a no-op. Lengths are counted in characters,
/// never bytes, so multi-byte text is never split inside a character.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
