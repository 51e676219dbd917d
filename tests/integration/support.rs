//! Shared fixtures for the integration tests

use sitesift::config::{load_config, Config};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds an HTML page whose main content is long enough to be accepted
pub fn html_page(title: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();

    format!(
        r#"<html><head><title>{title}</title></head><body>
        <nav><a href="/">Home</a></nav>
        <main>
            <h1>{title}</h1>
            <p>This is the {title} page. It has enough text to count as real content.</p>
            <ul>{anchors}</ul>
        </main>
        <footer>Footer text</footer>
        </body></html>"#
    )
}

/// Serves `body` as HTML at `route`
pub async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html"),
        )
        .mount(server)
        .await;
}

/// Writes a configuration file for a crawl of `seed_url` and loads it
pub fn write_config(dir: &Path, seed_url: &str, max_depth: u32, max_pages: u32) -> Config {
    let data_dir = dir.join("data");
    let content = format!(
        r#"
[crawler]
seed-url = "{seed_url}"
max-depth = {max_depth}
max-pages = {max_pages}
respect-robots-txt = true

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
data-dir = "{data}"
ledger-path = "{data}/ledger.db"

[transform]
provider = "ollama"
min-output-chars = 10

[transform.backoff]
base-ms = 100
ceiling-ms = 1000

[providers.ollama]
model = "test-model"
"#,
        data = data_dir.display()
    );

    let path = dir.join("sitesift.toml");
    std::fs::write(&path, content).expect("write config");
    load_config(&path).expect("config loads")
}
