//! End-to-end tests: crawl a mock site, clean through a mock provider, export

use crate::support::{html_page, mount_html, write_config};
use serde_json::json;
use sitesift::config::{Config, ProviderKind, ResolvedProvider};
use sitesift::crawler::{run_crawl, HttpFetcher};
use sitesift::output::{export_text, MarkdownStore};
use sitesift::pipeline::{clean_pages, CleanReport};
use sitesift::state::BackoffPolicy;
use sitesift::storage::{CleaningOutcome, Ledger, SqliteStorage, Stage, Storage};
use sitesift::transform::{ChatProvider, RateLimitController};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_site(server: &MockServer) {
    mount_html(
        server,
        "/",
        html_page("Home", &["/services".to_string(), "/hours.html".to_string()]),
    )
    .await;
    mount_html(server, "/services", html_page("Services", &[])).await;
    mount_html(server, "/hours.html", html_page("Hours", &[])).await;
}

fn controller(config: &Config, llm: &MockServer) -> RateLimitController {
    let resolved = ResolvedProvider {
        kind: ProviderKind::Ollama,
        model: "test-model".to_string(),
        base_url: Url::parse(&llm.uri()).unwrap(),
        api_key: None,
    };
    let provider = ChatProvider::new(&resolved, &config.transform).unwrap();

    RateLimitController::new(
        Arc::new(provider),
        BackoffPolicy::from(&config.transform.backoff),
        config.transform.max_input_chars,
        config.transform.max_provider_errors,
    )
}

fn fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::with_client(
        reqwest::Client::new(),
        "TestBot",
        true,
        Duration::ZERO,
    ))
}

#[tokio::test]
async fn test_crawl_clean_export() {
    let site = MockServer::start().await;
    mount_site(&site).await;

    let llm = MockServer::start().await;
    // one rate limit without a wait hint, then steady success
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit reached"))
        .up_to_n_times(1)
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "## Cleaned\n\nUseful content only." }
        })))
        .expect(3)
        .mount(&llm)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", site.uri()), 1, 50);

    let stats = run_crawl(&config, fetcher(), None).await.unwrap();
    assert_eq!(stats.fetched, 3);

    let raw = MarkdownStore::new(config.output.raw_dir());
    let cleaned = MarkdownStore::new(config.output.cleaned_dir());
    let report = clean_pages(&raw, &cleaned, &controller(&config, &llm), 10, 2, None)
        .await
        .unwrap();
    assert_eq!(
        report,
        CleanReport {
            total: 3,
            cleaned: 3,
            skipped: 0,
            failed: 0
        }
    );

    // cleaned files keep the raw names and frontmatter
    let hours = MarkdownStore::read_page(&config.output.cleaned_dir().join("hours.md")).unwrap();
    assert_eq!(hours.url, format!("{}/hours.html", site.uri()));
    assert_eq!(hours.depth, 1);
    assert_eq!(hours.title.as_deref(), Some("Hours"));
    assert_eq!(hours.content, "## Cleaned\n\nUseful content only.");

    let export = export_text(
        &config.output.cleaned_dir(),
        &config.output.txt_dir(),
        &config.output.combined_path(),
        config.output.max_upload_bytes,
    )
    .unwrap();

    let names: Vec<_> = export.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["hours.txt", "index.txt", "services.txt"]);
    assert!(export.oversized.is_empty());

    let combined = std::fs::read_to_string(export.combined.unwrap()).unwrap();
    assert!(combined.starts_with("# Source: hours.txt"));
    assert!(combined.contains("# Source: index.txt"));
    assert!(combined.contains(&format!("source: {}/services", site.uri())));
    assert_eq!(combined.matches("Useful content only.").count(), 3);
}

#[tokio::test]
async fn test_failed_cleanings_leave_raw_pages() {
    let site = MockServer::start().await;
    mount_site(&site).await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&llm)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", site.uri()), 0, 50);
    run_crawl(&config, fetcher(), None).await.unwrap();

    let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
    let ledger = Ledger::start(storage.clone(), Stage::Clean, "hash").unwrap();

    let raw = MarkdownStore::new(config.output.raw_dir());
    let cleaned = MarkdownStore::new(config.output.cleaned_dir());
    let report = clean_pages(
        &raw,
        &cleaned,
        &controller(&config, &llm),
        10,
        1,
        Some(&ledger),
    )
    .await
    .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.cleaned, 0);
    assert!(cleaned.list_pages().unwrap().is_empty());
    assert_eq!(raw.list_pages().unwrap().len(), 1);

    let storage = storage.lock().unwrap();
    let records = storage.get_cleanings(ledger.run_id()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, CleaningOutcome::Failed);
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("model not loaded"));

    // nothing to export
    let export = export_text(
        &config.output.cleaned_dir(),
        &config.output.txt_dir(),
        &config.output.combined_path(),
        config.output.max_upload_bytes,
    )
    .unwrap();
    assert!(export.files.is_empty());
    assert!(export.combined.is_none());
}
