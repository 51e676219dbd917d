//! Adaptive rate-limit controller
//!
//! Every provider call made during a clean run goes through one controller.
//! It keeps a single [`RateLimitState`] behind an async mutex: callers wait
//! for the shared "next allowed" instant, make their attempt, and feed the
//! outcome back so the pacing interval widens under rate limits and narrows
//! again as calls succeed.

use crate::state::{BackoffPolicy, RateLimitState};
use crate::transform::{
    truncate_content, ContentTransform, MessagePatternExtractor, RetryAfterExtractor,
    TransformError, TransformErrorKind, TransformFailure,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Wraps a [`ContentTransform`] with truncation, pacing and backoff
pub struct RateLimitController {
    transform: Arc<dyn ContentTransform>,
    extractor: Box<dyn RetryAfterExtractor + Send + Sync>,
    policy: BackoffPolicy,
    max_input_chars: usize,
    max_provider_errors: u32,
    state: Mutex<RateLimitState>,
}

impl RateLimitController {
    pub fn new(
        transform: Arc<dyn ContentTransform>,
        policy: BackoffPolicy,
        max_input_chars: usize,
        max_provider_errors: u32,
    ) -> Self {
        Self {
            transform,
            extractor: Box::new(MessagePatternExtractor::new()),
            state: Mutex::new(RateLimitState::new(&policy)),
            policy,
            max_input_chars,
            max_provider_errors: max_provider_errors.max(1),
        }
    }

    /// Replaces the retry-after extractor
    pub fn with_extractor(mut self, extractor: Box<dyn RetryAfterExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.transform.name()
    }

    /// Snapshot of the shared pacing state
    pub async fn state(&self) -> RateLimitState {
        self.state.lock().await.clone()
    }

    /// Cleans `raw`, retrying through rate limits
    ///
    /// Input longer than the configured maximum is truncated first. Rate-limit
    /// signals are retried without a count limit, each after the wait the
    /// provider asked for or the exponential fallback. Other provider failures
    /// are retried until `max_provider_errors` of them occurred within this
    /// call; a content-too-large answer gives up immediately.
    pub async fn transform(&self, raw: &str) -> Result<String, TransformError> {
        let raw_chars = raw.chars().count();
        if raw_chars > self.max_input_chars {
            debug!(
                "Truncating input from {} to {} characters",
                raw_chars, self.max_input_chars
            );
        }
        let input = truncate_content(raw, self.max_input_chars);

        let mut provider_errors = 0u32;

        loop {
            self.wait_turn().await;

            match self.transform.clean(&input).await {
                Ok(cleaned) => {
                    let mut state = self.state.lock().await;
                    state.record_success(&self.policy, Instant::now());
                    return Ok(cleaned);
                }
                Err(TransformFailure::RateLimited(signal)) => {
                    let explicit = self.extractor.extract_retry_after(&signal);
                    let wait = {
                        let mut state = self.state.lock().await;
                        state.record_rate_limit(explicit, &self.policy, Instant::now())
                    };

                    match explicit {
                        Some(_) => info!(
                            "{} rate limited, waiting {:?} as requested",
                            self.transform.name(),
                            wait
                        ),
                        None => info!(
                            "{} rate limited, backing off {:?}",
                            self.transform.name(),
                            wait
                        ),
                    }
                }
                Err(TransformFailure::ContentTooLarge(message)) => {
                    warn!("{} rejected the input as too large", self.transform.name());
                    return Err(TransformError {
                        kind: TransformErrorKind::ProviderError,
                        message: format!("content too large: {}", message),
                    });
                }
                Err(TransformFailure::Provider(message)) => {
                    provider_errors += 1;
                    warn!(
                        "{} error ({}/{}): {}",
                        self.transform.name(),
                        provider_errors,
                        self.max_provider_errors,
                        message
                    );

                    if provider_errors >= self.max_provider_errors {
                        return Err(TransformError::provider(message));
                    }
                }
            }
        }
    }

    /// Sleeps until the shared "next allowed" instant has passed
    ///
    /// The instant is re-read after every sleep since another caller may have
    /// pushed it further out in the meantime.
    async fn wait_turn(&self) {
        loop {
            let wait = self.state.lock().await.remaining_wait(Instant::now());
            if wait == Duration::ZERO {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }
}
