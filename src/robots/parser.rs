//! Robots.txt rules
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! `Crawl-delay` extension is read here since that crate ignores it.

use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Longest crawl delay honoured; larger values are clamped to it
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Rules from one origin's robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt content; empty allows everything
    content: String,
}

impl RobotsRules {
    /// Creates rules from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow everything, used when robots.txt is absent or unreadable
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if `url` may be fetched by the crawler named `agent`
    pub fn is_allowed(&self, url: &Url, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url.as_str())
    }

    /// Gets the crawl delay that applies to `agent`
    ///
    /// A group naming the agent wins over the `*` group. Consecutive
    /// `User-agent` lines share one group. Delays above [`MAX_CRAWL_DELAY`]
    /// are clamped.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let agent = agent.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut reading_agents = false;
        let mut for_agent: Option<f64> = None;
        let mut for_wildcard: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if !reading_agents {
                        group.clear();
                    }
                    reading_agents = true;
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    reading_agents = false;
                    let Some(delay) = value
                        .parse::<f64>()
                        .ok()
                        .filter(|d| d.is_finite() && *d >= 0.0)
                    else {
                        continue;
                    };

                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        for_agent.get_or_insert(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard.get_or_insert(delay);
                    }
                }
                _ => reading_agents = false,
            }
        }

        for_agent
            .or(for_wildcard)
            .map(|secs| secs.min(MAX_CRAWL_DELAY.as_secs_f64()))
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
