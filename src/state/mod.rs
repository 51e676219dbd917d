//! State module for crawl tasks and LLM call pacing
//!
//! # Components
//!
//! - `TaskStatus`: Lifecycle of a single crawl task (pending, fetched, failed, skipped)
//! - `RateLimitState`: Adaptive backoff state shared by every call through one controller
//! - `BackoffPolicy`: Base, ceiling and floor the backoff state works within

mod rate_limit_state;
mod task_status;

pub use rate_limit_state::{BackoffPolicy, RateLimitState};
pub use task_status::TaskStatus;
