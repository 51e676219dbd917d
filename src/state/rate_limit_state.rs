use crate::config::BackoffConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff tuning in the form the controller works with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First fallback wait when the provider gives no duration
    pub base: Duration,

    /// Upper bound on any single wait
    pub ceiling: Duration,

    /// Lowest pacing interval between calls
    pub floor: Duration,

    /// Consecutive successes after which the interval returns to the floor
    pub reset_after_successes: u32,
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            ceiling: Duration::from_millis(config.ceiling_ms),
            floor: Duration::from_millis(config.floor_ms),
            reset_after_successes: config.reset_after_successes,
        }
    }
}

impl BackoffPolicy {
    /// Fallback wait for the given number of consecutive rate-limit failures:
    /// `base * 2^failures`, capped at the ceiling
    pub fn fallback_wait(&self, consecutive_failures: u32) -> Duration {
        let factor = 1u32.checked_shl(consecutive_failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.ceiling)
            .min(self.ceiling)
    }
}

/// Adaptive pacing state shared by every call made through one controller
///
/// The state only moves through [`record_success`](Self::record_success) and
/// [`record_rate_limit`](Self::record_rate_limit); the controller holds it
/// behind a mutex so concurrent callers observe one consistent schedule.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// Current pacing interval between calls
    pub interval: Duration,

    /// Rate-limit signals without an explicit duration since the last success
    pub consecutive_failures: u32,

    /// Most recent wait reported by the provider
    pub last_retry_after: Option<Duration>,

    /// Successes since the last rate-limit signal
    pub success_streak: u32,

    /// No call may start before this instant
    pub next_allowed: Option<Instant>,
}

impl RateLimitState {
    /// Creates a state pacing at the policy's floor
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            interval: policy.floor,
            consecutive_failures: 0,
            last_retry_after: None,
            success_streak: 0,
            next_allowed: None,
        }
    }

    /// Time a caller must still wait before starting a call
    pub fn remaining_wait(&self, now: Instant) -> Duration {
        match self.next_allowed {
            Some(at) if at > now => at - now,
            _ => Duration::ZERO,
        }
    }

    /// Records a successful call
    ///
    /// Halves the interval (never below the floor) and clears the failure
    /// count. A long enough success streak drops the interval to the floor.
    pub fn record_success(&mut self, policy: &BackoffPolicy, now: Instant) {
        self.interval = (self.interval / 2).max(policy.floor);
        self.consecutive_failures = 0;
        self.success_streak = self.success_streak.saturating_add(1);

        if self.success_streak >= policy.reset_after_successes {
            self.interval = policy.floor;
        }

        self.push_next_allowed(now + self.interval);
    }

    /// Records a rate-limit signal and returns the wait it imposes
    ///
    /// An explicit duration from the provider is honoured as given (bounded by
    /// the ceiling) and leaves the failure count alone. Without one the wait is
    /// the exponential fallback and the failure count grows.
    pub fn record_rate_limit(
        &mut self,
        explicit: Option<Duration>,
        policy: &BackoffPolicy,
        now: Instant,
    ) -> Duration {
        self.success_streak = 0;

        let wait = match explicit {
            Some(requested) => {
                let wait = requested.min(policy.ceiling);
                self.last_retry_after = Some(wait);
                wait
            }
            None => {
                let wait = policy.fallback_wait(self.consecutive_failures);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                wait
            }
        };

        self.interval = self.interval.max(wait);
        self.push_next_allowed(now + wait);
        wait
    }

    /// Moves the next allowed instant to `at` unless a later one is already set
    ///
    /// A call that completes while another caller's wait is pending must not
    /// shorten that wait.
    fn push_next_allowed(&mut self, at: Instant) {
        self.next_allowed = Some(self.next_allowed.map_or(at, |current| current.max(at)));
    }
}
