//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt files so the crawler can respect
//! their directives.

mod parser;

pub use parser::RobotsRules;

use tracing::{debug, warn};
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// A missing file (4xx) allows everything. Server errors and network failures
/// are logged and also treated as allow-all, so an unreachable robots.txt never
/// blocks the crawl by itself.
pub async fn fetch_robots(client: &reqwest::Client, url: &Url) -> RobotsRules {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(e) => {
            warn!("Cannot build robots.txt URL for {}: {}", url, e);
            return RobotsRules::allow_all();
        }
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to fetch {}: {}", robots_url, e);
            return RobotsRules::allow_all();
        }
    };

    let status = response.status();
    if !status.is_success() {
        if status.is_server_error() {
            warn!("{} returned HTTP {}; allowing all", robots_url, status.as_u16());
        } else {
            debug!("No robots.txt at {} (HTTP {})", robots_url, status.as_u16());
        }
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRules::from_content(&body),
        Err(e) => {
            warn!("Failed to read {}: {}", robots_url, e);
            RobotsRules::allow_all()
        }
    }
}
