//! Chat-completion providers
//!
//! One [`ChatProvider`] speaks to whichever API the configuration resolved:
//! - Ollama: `POST /api/chat`
//! - Anthropic: `POST /v1/messages`
//! - OpenRouter: `POST /chat/completions` (OpenAI-compatible)
//!
//! Responses are classified into the failure kinds the rate-limit controller
//! understands. Nothing here retries; that is the controller's job.

use crate::config::{ProviderKind, ResolvedProvider, TransformConfig};
use crate::transform::{ContentTransform, RateLimitSignal, TransformFailure};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Prompt prefixed to every page when the configuration sets none
pub const DEFAULT_INSTRUCTIONS: &str = "\
Clean this scraped markdown page for a knowledge base.

Remove navigation, menus, footers, sidebars, ads, widgets, social media \
buttons and repeated boilerplate. Keep every piece of substantive content, \
including dates, times, contact details and procedures.

Output clean, well-formatted markdown with the same heading structure. \
Do not add commentary; only output the cleaned content.

Here is the content to clean:

";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic's "overloaded" status
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Cleans content with a chat model
pub struct ChatProvider {
    client: Client,
    kind: ProviderKind,
    model: String,
    base_url: Url,
    api_key: Option<String>,
    instructions: String,
    max_output_tokens: u32,
}

impl ChatProvider {
    /// Builds a provider with its own HTTP client
    pub fn new(
        resolved: &ResolvedProvider,
        transform: &TransformConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(transform.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let instructions = transform
            .instructions
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

        Ok(Self::with_client(
            client,
            resolved,
            instructions,
            transform.max_output_tokens,
        ))
    }

    pub fn with_client(
        client: Client,
        resolved: &ResolvedProvider,
        instructions: String,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            kind: resolved.kind,
            model: resolved.model.clone(),
            base_url: resolved.base_url.clone(),
            api_key: resolved.api_key.clone(),
            instructions,
            max_output_tokens,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    /// Sends the request for this provider's API
    async fn send(&self, prompt: &str) -> Result<reqwest::Response, reqwest::Error> {
        let messages = vec![ChatMessage {
            role: "user",
            content: prompt,
        }];

        match self.kind {
            ProviderKind::Ollama => {
                self.client
                    .post(self.endpoint("/api/chat"))
                    .json(&OllamaRequest {
                        model: &self.model,
                        messages,
                        stream: false,
                        options: OllamaOptions {
                            num_predict: self.max_output_tokens,
                        },
                    })
                    .send()
                    .await
            }
            ProviderKind::Anthropic => {
                self.client
                    .post(self.endpoint("/v1/messages"))
                    .header("x-api-key", self.api_key.as_deref().unwrap_or_default())
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&AnthropicRequest {
                        model: &self.model,
                        max_tokens: self.max_output_tokens,
                        messages,
                    })
                    .send()
                    .await
            }
            ProviderKind::Openrouter => {
                self.client
                    .post(self.endpoint("/chat/completions"))
                    .bearer_auth(self.api_key.as_deref().unwrap_or_default())
                    .json(&CompletionRequest {
                        model: &self.model,
                        max_tokens: self.max_output_tokens,
                        messages,
                    })
                    .send()
                    .await
            }
        }
    }

    /// Pulls the generated text out of a successful response body
    fn extract_text(&self, body: &str) -> Result<String, TransformFailure> {
        let parse_error = |e: serde_json::Error| {
            TransformFailure::Provider(format!("Unexpected {} response: {}", self.kind, e))
        };

        let text = match self.kind {
            ProviderKind::Ollama => {
                serde_json::from_str::<OllamaResponse>(body)
                    .map_err(parse_error)?
                    .message
                    .content
            }
            ProviderKind::Anthropic => serde_json::from_str::<AnthropicResponse>(body)
                .map_err(parse_error)?
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .map(|block| block.text)
                .collect::<Vec<_>>()
                .join(""),
            ProviderKind::Openrouter => serde_json::from_str::<CompletionResponse>(body)
                .map_err(parse_error)?
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(TransformFailure::Provider(format!(
                "{} returned an empty response",
                self.kind
            )));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl ContentTransform for ChatProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn clean(&self, text: &str) -> Result<String, TransformFailure> {
        let prompt = format!("{}{}", self.instructions, text);
        let start = std::time::Instant::now();

        let response = self
            .send(&prompt)
            .await
            .map_err(|e| TransformFailure::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        let retry_after = retry_after_header(response.headers(), Utc::now());
        let body = response
            .text()
            .await
            .map_err(|e| TransformFailure::Provider(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_failure(status, retry_after, &body));
        }

        // OpenRouter reports some upstream failures inside a 200 response
        if let Some(failure) = embedded_error(&body, retry_after) {
            return Err(failure);
        }

        let cleaned = self.extract_text(&body)?;
        debug!(
            "{} ({}) cleaned {} chars into {} chars in {:?}",
            self.kind,
            self.model,
            text.chars().count(),
            cleaned.chars().count(),
            start.elapsed()
        );
        Ok(cleaned)
    }
}

/// Checks whether an Ollama server answers at `base_url`
pub async fn check_available(client: &Client, base_url: &Url) -> bool {
    match client
        .get(endpoint(base_url, "/api/tags"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(response) => response.status() == StatusCode::OK,
        Err(e) => {
            debug!("Ollama availability check failed: {}", e);
            false
        }
    }
}

fn endpoint(base_url: &Url, path: &str) -> String {
    format!("{}{}", base_url.as_str().trim_end_matches('/'), path)
}

/// Maps a non-success response to a failure kind
fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> TransformFailure {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == STATUS_OVERLOADED
        || mentions_rate_limit(body)
    {
        return TransformFailure::RateLimited(RateLimitSignal {
            retry_after,
            message: Some(body.to_string()).filter(|b| !b.is_empty()),
        });
    }

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return TransformFailure::ContentTooLarge(body.to_string());
    }

    TransformFailure::Provider(format!("HTTP {}: {}", status.as_u16(), body))
}

/// Looks for an `{"error": {...}}` object in an otherwise successful body
fn embedded_error(body: &str, retry_after: Option<Duration>) -> Option<TransformFailure> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    let code = error
        .get("code")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY);

    Some(classify_failure(code, retry_after, &message))
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("rate_limit") || lower.contains("rate limit")
}

/// Reads a `Retry-After` header given in seconds or as an HTTP date
fn retry_after_header(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        at.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
