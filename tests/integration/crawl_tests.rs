//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use crate::support::{html_page, mount_html, write_config};
use futures::StreamExt;
use sitesift::crawler::{run_crawl, CrawlRun, FetchError, HttpFetcher, PageFetcher};
use sitesift::output::MarkdownStore;
use sitesift::state::TaskStatus;
use sitesift::storage::{Ledger, SqliteStorage, Stage, Storage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(respect_robots: bool) -> HttpFetcher {
    HttpFetcher::with_client(
        reqwest::Client::new(),
        "TestBot",
        respect_robots,
        Duration::ZERO,
    )
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

/// Mounts a small site: the seed links to three pages, one of which links deeper
async fn mount_site(server: &MockServer) {
    let base = server.uri();
    mount_html(
        server,
        "/",
        html_page(
            "Home",
            &[
                format!("{}/about", base),
                "/events".to_string(),
                "contact".to_string(),
            ],
        ),
    )
    .await;
    mount_html(server, "/about", html_page("About", &["/about/history".to_string()])).await;
    mount_html(server, "/events", html_page("Events", &["/".to_string()])).await;
    mount_html(server, "/contact", html_page("Contact", &[])).await;
    mount_html(server, "/about/history", html_page("History", &[])).await;
}

#[tokio::test]
async fn test_fetcher_extracts_content_and_links() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let page = fetcher(false).fetch(&url(&server, "/")).await.unwrap();

    assert_eq!(page.title.as_deref(), Some("Home"));
    assert!(page.content.contains("This is the Home page."));
    assert!(!page.content.contains("Footer text"));

    // the nav link comes first and is kept; only the rendered body skips nav
    let links: Vec<_> = page.links.iter().map(|l| l.path().to_string()).collect();
    assert_eq!(links, vec!["/", "/about", "/events", "/contact"]);
}

#[tokio::test]
async fn test_fetcher_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = fetcher(false);

    let result = fetcher.fetch(&url(&server, "/report.pdf")).await;
    assert!(matches!(result, Err(FetchError::NotHtml { .. })));

    let result = fetcher.fetch(&url(&server, "/broken")).await;
    assert!(matches!(result, Err(FetchError::Status(500))));

    let result = fetcher.fetch(&url(&server, "/missing")).await;
    assert!(matches!(result, Err(FetchError::Status(404))));
}

#[tokio::test]
async fn test_fetcher_respects_robots_txt() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /about\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(true);
    assert!(fetcher.fetch(&url(&server, "/")).await.is_ok());
    assert!(matches!(
        fetcher.fetch(&url(&server, "/about")).await,
        Err(FetchError::RobotsDenied)
    ));
    assert!(fetcher.fetch(&url(&server, "/events")).await.is_ok());
    // robots.txt is fetched once per origin (checked by `expect(1)` on drop)
}

#[tokio::test]
async fn test_fetcher_follows_redirects() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/old-about"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/about", server.uri()).as_str()),
        )
        .mount(&server)
        .await;

    let page = fetcher(false).fetch(&url(&server, "/old-about")).await.unwrap();
    assert_eq!(page.final_url.path(), "/about");
    assert_eq!(page.title.as_deref(), Some("About"));
}

#[tokio::test]
async fn test_fetcher_rejects_redirect_to_other_origin() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    mount_html(&other, "/landing", html_page("Elsewhere", &[])).await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/landing", other.uri()).as_str()),
        )
        .mount(&server)
        .await;

    let result = fetcher(false).fetch(&url(&server, "/moved")).await;
    match result {
        Err(FetchError::OffOriginRedirect { target }) => {
            assert_eq!(target, format!("{}/landing", other.uri()));
        }
        unexpected => panic!(
            "expected an off-origin redirect, got {:?}",
            unexpected.map(|p| p.final_url)
        ),
    }
}

#[tokio::test]
async fn test_crawl_depth_one_writes_four_pages() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", server.uri()), 1, 100);

    let stats = run_crawl(&config, Arc::new(fetcher(true)), None)
        .await
        .unwrap();
    assert_eq!(stats.fetched, 4);
    assert_eq!(stats.failed, 0);

    let store = MarkdownStore::new(config.output.raw_dir());
    let names: Vec<_> = store
        .list_pages()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["about.md", "contact.md", "events.md", "index.md"]);

    let about = MarkdownStore::read_page(&config.output.raw_dir().join("about.md")).unwrap();
    assert_eq!(about.depth, 1);
    assert_eq!(about.title.as_deref(), Some("About"));
    assert_eq!(about.url, format!("{}/about", server.uri()));
}

#[tokio::test]
async fn test_crawl_respects_page_budget() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", server.uri()), 3, 2);

    let stats = run_crawl(&config, Arc::new(fetcher(false)), None)
        .await
        .unwrap();

    assert_eq!(stats.fetched, 2);
    let store = MarkdownStore::new(config.output.raw_dir());
    assert_eq!(store.list_pages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_crawl_clears_previous_raw_pages() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", server.uri()), 0, 10);

    std::fs::create_dir_all(config.output.raw_dir()).unwrap();
    std::fs::write(config.output.raw_dir().join("stale.md"), "old").unwrap();

    run_crawl(&config, Arc::new(fetcher(false)), None)
        .await
        .unwrap();

    let store = MarkdownStore::new(config.output.raw_dir());
    assert_eq!(store.list_pages().unwrap().len(), 1);
    assert!(!config.output.raw_dir().join("stale.md").exists());
}

#[tokio::test]
async fn test_cross_origin_links_never_fetched() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html_page("Other", &[]), "text/html"))
        .expect(0)
        .mount(&other)
        .await;

    mount_html(
        &server,
        "/",
        html_page("Home", &[format!("{}/elsewhere", other.uri()), "/local".to_string()]),
    )
    .await;
    mount_html(&server, "/local", html_page("Local", &[])).await;

    let dir = TempDir::new().unwrap();
    let run = CrawlRun::new(
        url(&server, "/"),
        3,
        100,
        Arc::new(fetcher(false)),
        Arc::new(MarkdownStore::new(dir.path())),
    );
    let pages: Vec<_> = run.into_stream().collect().await;

    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p.url.starts_with(&server.uri())));
    // `other` verifies on drop that it received no requests
}

#[tokio::test]
async fn test_crawl_records_tasks_in_ledger() {
    let server = MockServer::start().await;
    mount_html(&server, "/about", html_page("About", &[])).await;
    mount_html(&server, "/thin", "<html><body><p>Too short.</p></body></html>".to_string()).await;
    mount_html(
        &server,
        "/",
        html_page("Home", &["/about".to_string(), "/thin".to_string(), "/gone".to_string()]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{}/", server.uri()), 1, 100);
    let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
    let ledger = Ledger::start(storage.clone(), Stage::Crawl, "hash").unwrap();

    let stats = run_crawl(&config, Arc::new(fetcher(false)), Some(ledger.clone()))
        .await
        .unwrap();
    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.failed, 2);

    let storage = storage.lock().unwrap();
    let tasks = storage.get_tasks(ledger.run_id()).unwrap();
    let status_of = |route: &str| {
        let target = format!("{}{}", server.uri(), route);
        tasks
            .iter()
            .find(|t| t.url == target)
            .map(|t| t.status)
            .unwrap()
    };

    assert_eq!(status_of("/about"), TaskStatus::Fetched);
    assert_eq!(status_of("/thin"), TaskStatus::Failed);
    assert_eq!(status_of("/gone"), TaskStatus::Failed);

    let counts = storage.count_tasks_by_status(ledger.run_id()).unwrap();
    assert_eq!(counts.get(&TaskStatus::Fetched), Some(&2));
}
