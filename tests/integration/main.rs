//! Integration tests
//!
//! HTTP collaborators are exercised against wiremock servers; file output goes
//! to temporary directories.

mod crawl_tests;
mod pipeline_tests;
mod support;
mod transform_tests;
