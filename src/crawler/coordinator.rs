//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Releasing tasks from the frontier into a bounded set of concurrent fetches
//! - Rejecting pages with too little content
//! - Writing every accepted page before it is yielded
//! - Feeding discovered links back into the frontier
//! - Recording each task in the run ledger

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, FetchedPage, PageFetcher};
use crate::crawler::frontier::{Admission, CrawlFrontier, CrawlTask};
use crate::output::{ArtifactWriter, MarkdownStore, Page};
use crate::state::TaskStatus;
use crate::storage::{Ledger, TaskRecord};
use crate::url::normalize_url;
use crate::SiftError;
use futures::future::BoxFuture;
use futures::stream::{self, FuturesUnordered, Stream};
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

type FetchFuture = BoxFuture<'static, (CrawlTask, Result<FetchedPage, FetchError>)>;

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub fetched: u32,
    pub failed: u32,

    /// Tasks admitted but never fetched because the page budget was spent
    pub skipped: u32,

    /// Links seen on fetched pages that point to another origin
    pub cross_origin_links: u64,
}

/// One breadth-first crawl from a seed URL
///
/// A run is driven by pulling pages from it, either with [`CrawlRun::next_page`]
/// or through [`CrawlRun::into_stream`]. Nothing is fetched until the first
/// page is requested, and a finished run stays finished.
pub struct CrawlRun {
    frontier: CrawlFrontier,
    fetcher: Arc<dyn PageFetcher>,
    writer: Arc<dyn ArtifactWriter>,
    ledger: Option<Ledger>,
    in_flight: FuturesUnordered<FetchFuture>,
    concurrency: usize,
    min_content_chars: usize,
    stats: CrawlStats,
    started: Option<Instant>,
    finished: bool,
}

impl CrawlRun {
    /// Creates a run that fetches one page at a time
    pub fn new(
        seed: Url,
        max_depth: u32,
        max_pages: u32,
        fetcher: Arc<dyn PageFetcher>,
        writer: Arc<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            frontier: CrawlFrontier::new(seed, max_depth, max_pages),
            fetcher,
            writer,
            ledger: None,
            in_flight: FuturesUnordered::new(),
            concurrency: 1,
            min_content_chars: 0,
            stats: CrawlStats::default(),
            started: None,
            finished: false,
        }
    }

    /// Sets the number of fetches allowed in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Pages whose trimmed content is shorter than this fail with
    /// [`FetchError::EmptyContent`]
    pub fn with_min_content_chars(mut self, min_content_chars: usize) -> Self {
        self.min_content_chars = min_content_chars;
        self
    }

    /// Records every task of this run in the ledger
    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        for task in self.frontier.queued() {
            ledger.record_task(&task_record(task, None));
        }
        self.ledger = Some(ledger);
        self
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn frontier(&self) -> &CrawlFrontier {
        &self.frontier
    }

    /// Fetches until the next page is accepted
    ///
    /// Returns None once the frontier is exhausted or the page budget is
    /// spent. The page has already been written when it is returned.
    pub async fn next_page(&mut self) -> Option<Page> {
        if self.started.is_none() {
            info!("Starting crawl at {}", self.frontier.seed());
            self.started = Some(Instant::now());
        }

        loop {
            if self.finished {
                return None;
            }

            self.fill();

            let Some((task, result)) = self.in_flight.next().await else {
                self.finish();
                return None;
            };

            if let Some(page) = self.settle(task, result) {
                return Some(page);
            }
        }
    }

    /// Turns the run into a lazy stream of accepted pages
    pub fn into_stream(self) -> impl Stream<Item = Page> + Send {
        stream::unfold(self, |mut run| async move {
            let page = run.next_page().await?;
            Some((page, run))
        })
    }

    /// Starts fetches until the concurrency limit or the frontier says stop
    fn fill(&mut self) {
        while self.in_flight.len() < self.concurrency {
            let Some(task) = self.frontier.next_task() else {
                break;
            };

            debug!("Fetching {} (depth {})", task.url, task.depth);
            let fetcher = Arc::clone(&self.fetcher);
            self.in_flight.push(
                async move {
                    let result = fetcher.fetch(&task.url).await;
                    (task, result)
                }
                .boxed(),
            );
        }
    }

    /// Handles one completed fetch, returning the page if it was accepted
    fn settle(
        &mut self,
        mut task: CrawlTask,
        result: Result<FetchedPage, FetchError>,
    ) -> Option<Page> {
        let fetched = match result.and_then(|page| self.check_content(page)) {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Failed to fetch {}: {}", task.url, e);
                self.frontier.complete_rejected();
                self.stats.failed += 1;
                task.status = TaskStatus::Failed;
                self.record(&task, Some(e.to_string()));
                return None;
            }
        };

        if self.frontier.budget_exhausted() {
            self.frontier.complete_rejected();
            self.stats.skipped += 1;
            task.status = TaskStatus::Skipped;
            self.record(&task, Some("page budget reached".to_string()));
            return None;
        }

        let page = Page {
            url: task.url.to_string(),
            depth: task.depth,
            title: fetched.title,
            content: fetched.content,
        };

        if let Err(e) = self.writer.write(&page) {
            warn!("Failed to write page {}: {}", task.url, e);
            self.frontier.complete_rejected();
            self.stats.failed += 1;
            task.status = TaskStatus::Failed;
            self.record(&task, Some(e.to_string()));
            return None;
        }

        self.frontier.complete_accepted();
        self.stats.fetched += 1;
        task.status = TaskStatus::Fetched;
        self.record(&task, None);

        for link in fetched.links {
            match self.frontier.admit(link, task.depth + 1, Some(&task.url)) {
                Admission::Scheduled => {
                    if let Some(queued) = self.frontier.queued().last() {
                        self.record(queued, None);
                    }
                }
                Admission::CrossOrigin => self.stats.cross_origin_links += 1,
                _ => {}
            }
        }

        if self.stats.fetched % 10 == 0 {
            let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
            info!(
                "Progress: {} pages fetched, {} failed, {} queued, {:.2} pages/sec",
                self.stats.fetched,
                self.stats.failed,
                self.frontier.pending(),
                self.stats.fetched as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            );
        }

        Some(page)
    }

    fn check_content(&self, page: FetchedPage) -> Result<FetchedPage, FetchError> {
        let chars = page.content.trim().chars().count();
        if chars < self.min_content_chars {
            return Err(FetchError::EmptyContent { chars });
        }
        Ok(page)
    }

    /// Marks the run finished and reports tasks that were never fetched
    fn finish(&mut self) {
        for mut task in self.frontier.drain_pending() {
            self.stats.skipped += 1;
            task.status = TaskStatus::Skipped;
            self.record(&task, Some("page budget reached".to_string()));
        }
        self.finished = true;

        info!(
            "Crawl completed: {} pages fetched, {} failed, {} skipped in {:?}",
            self.stats.fetched,
            self.stats.failed,
            self.stats.skipped,
            self.started.map(|s| s.elapsed()).unwrap_or_default()
        );
    }

    fn record(&self, task: &CrawlTask, error: Option<String>) {
        if let Some(ledger) = &self.ledger {
            ledger.record_task(&task_record(task, error));
        }
    }
}

fn task_record(task: &CrawlTask, error_message: Option<String>) -> TaskRecord {
    TaskRecord {
        url: task.url.to_string(),
        depth: task.depth,
        parent_url: task.parent.as_ref().map(Url::to_string),
        status: task.status,
        error_message,
    }
}

/// Runs the crawl stage
///
/// The raw page directory is cleared, then every accepted page is written to
/// it as markdown with frontmatter.
///
/// # Arguments
///
/// * `config` - The pipeline configuration
/// * `fetcher` - Source of pages
/// * `ledger` - Run ledger to record tasks in, if any
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Counters of the finished run
/// * `Err(SiftError)` - The seed URL or raw directory was unusable
///
/// # Example
///
/// ```no_run
/// use sitesift::config::load_config;
/// use sitesift::crawler::{run_crawl, HttpFetcher};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("sitesift.toml"))?;
/// let fetcher = Arc::new(HttpFetcher::new(&config.crawler, &config.user_agent)?);
/// let stats = run_crawl(&config, fetcher, None).await?;
/// println!("{} pages", stats.fetched);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    fetcher: Arc<dyn PageFetcher>,
    ledger: Option<Ledger>,
) -> Result<CrawlStats, SiftError> {
    let seed = normalize_url(&config.crawler.seed_url)?;

    let store = MarkdownStore::new(config.output.raw_dir());
    store.reset()?;

    let mut run = CrawlRun::new(
        seed,
        config.crawler.max_depth,
        config.crawler.max_pages,
        fetcher,
        Arc::new(store),
    )
    .with_concurrency(config.crawler.concurrency as usize)
    .with_min_content_chars(config.crawler.min_content_chars);

    if let Some(ledger) = ledger {
        run = run.with_ledger(ledger);
    }

    while let Some(page) = run.next_page().await {
        debug!("Saved {} (depth {})", page.url, page.depth);
    }

    Ok(run.stats().clone())
}
