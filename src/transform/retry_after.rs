//! Retry durations from rate-limit signals
//!
//! Providers report how long to back off in different places: a header, a
//! JSON field, or only in the prose of an error message. Extraction looks at
//! the structured field first and falls back to message patterns.

use crate::transform::RateLimitSignal;
use regex::Regex;
use std::time::Duration;

/// Finds the wait a provider asked for, if it asked for one
pub trait RetryAfterExtractor {
    fn extract_retry_after(&self, signal: &RateLimitSignal) -> Option<Duration>;
}

/// Extracts waits from the structured field or from common message phrasings
///
/// Recognised phrasings (case-insensitive):
/// - `try again in 20s`, `try again in 1.5 seconds`, `try again in 500ms`
/// - `retry-after: 30`, `Retry after 12 seconds`
/// - `wait 7 seconds`
/// - `30 seconds ... limit` (a duration followed later by limit/wait/retry)
/// - `"retryDelay": "30s"` as embedded in some JSON error bodies
#[derive(Debug)]
pub struct MessagePatternExtractor {
    patterns: Vec<Regex>,
}

const UNIT: &str = r"(ms|milliseconds?|s\b|secs?\b|seconds?|m\b|mins?\b|minutes?)";

impl MessagePatternExtractor {
    pub fn new() -> Self {
        let sources = [
            format!(r#"(?i)"retryDelay"\s*:\s*"(\d+(?:\.\d+)?)\s*{UNIT}""#),
            format!(r"(?i)try again in\s+(\d+(?:\.\d+)?)\s*{UNIT}"),
            format!(r"(?i)retry.after[:\s]+(\d+(?:\.\d+)?)\s*{UNIT}?"),
            format!(r"(?i)\bwait\s+(\d+(?:\.\d+)?)\s*{UNIT}"),
            format!(r"(?i)(\d+(?:\.\d+)?)\s*{UNIT}.*?(?:limit|wait|retry)"),
        ];

        let patterns = sources
            .iter()
            .filter_map(|source| Regex::new(source).ok())
            .collect();

        Self { patterns }
    }

    fn from_message(&self, message: &str) -> Option<Duration> {
        self.patterns.iter().find_map(|pattern| {
            let captures = pattern.captures(message)?;
            let value: f64 = captures.get(1)?.as_str().parse().ok()?;
            let unit = captures.get(2).map_or("s", |m| m.as_str());
            to_duration(value, unit)
        })
    }
}

impl Default for MessagePatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// A zero wait (`Retry-After: 0`, a date already past) counts as no hint, so
/// the exponential fallback applies instead of an immediate retry.
impl RetryAfterExtractor for MessagePatternExtractor {
    fn extract_retry_after(&self, signal: &RateLimitSignal) -> Option<Duration> {
        signal
            .retry_after
            .filter(|wait| !wait.is_zero())
            .or_else(|| signal.message.as_deref().and_then(|m| self.from_message(m)))
            .filter(|wait| !wait.is_zero())
    }
}

fn to_duration(value: f64, unit: &str) -> Option<Duration> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let unit = unit.to_ascii_lowercase();
    let seconds = if unit.starts_with("ms") || unit.starts_with("milli") {
        value / 1000.0
    } else if unit.starts_with('m') {
        value * 60.0
    } else {
        value
    };

    Duration::try_from_secs_f64(seconds).ok()
}
