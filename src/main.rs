//! Sitesift main entry point
//!
//! This is the command-line interface for the crawl, clean and export pipeline.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use sitesift::config::{
    load_config_with_hash, resolve_provider, Config, ProviderKind, ResolvedProvider,
};
use sitesift::crawler::{run_crawl, HttpFetcher};
use sitesift::output::{export_text, load_statistics, print_statistics, MarkdownStore};
use sitesift::pipeline::clean_pages;
use sitesift::state::BackoffPolicy;
use sitesift::storage::{open_storage, Ledger, RunStatus, SqliteStorage, Stage};
use sitesift::transform::{check_available, ChatProvider, RateLimitController};
use sitesift::{ConfigError, SiftError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Sitesift: crawl a website and prepare it for a knowledge base
///
/// Sitesift crawls a site breadth-first from a seed URL, cleans every page
/// with an LLM provider, and exports upload-ready text files.
#[derive(Parser, Debug)]
#[command(name = "sitesift")]
#[command(version)]
#[command(about = "Crawl, clean and package a website for a knowledge base", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Pipeline stage to run
    #[arg(long, value_enum, default_value_t = StageArg::All)]
    stage: StageArg,

    /// LLM provider, overriding the configuration file
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and provider settings without fetching or cleaning anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the run ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StageArg {
    Crawl,
    Clean,
    Export,
    All,
}

impl StageArg {
    fn includes(self, stage: Stage) -> bool {
        match self {
            Self::All => true,
            Self::Crawl => stage == Stage::Crawl,
            Self::Clean => stage == Stage::Clean,
            Self::Export => stage == Stage::Export,
        }
    }
}

type SharedStorage = Arc<Mutex<SqliteStorage>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Variables from .env feed the overrides and provider credentials
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    // The provider is settled before any page is fetched
    let provider = if cli.stage.includes(Stage::Clean) {
        Some(prepare_provider(&config, cli.provider).await?)
    } else {
        None
    };

    if cli.dry_run {
        handle_dry_run(&config, cli.stage, provider.as_ref());
        return Ok(());
    }

    let storage: SharedStorage = Arc::new(Mutex::new(
        open_storage(Path::new(&config.output.ledger_path))
            .with_context(|| format!("Cannot open ledger {}", config.output.ledger_path))?,
    ));

    if cli.stage.includes(Stage::Crawl) {
        handle_crawl(&config, &config_hash, &storage).await?;
    }

    if let Some(provider) = &provider {
        handle_clean(&config, &config_hash, &storage, provider).await?;
    }

    if cli.stage.includes(Stage::Export) {
        handle_export(&config, &config_hash, &storage)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitesift=info,warn"),
            1 => EnvFilter::new("sitesift=debug,info"),
            2 => EnvFilter::new("sitesift=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves the provider and, for a local server, checks that it answers
async fn prepare_provider(
    config: &Config,
    selected: Option<ProviderKind>,
) -> anyhow::Result<ResolvedProvider> {
    let provider = resolve_provider(config, selected)?;

    if provider.kind == ProviderKind::Ollama {
        let client = reqwest::Client::new();
        if !check_available(&client, &provider.base_url).await {
            return Err(ConfigError::ProviderUnavailable {
                provider: provider.kind.to_string(),
                endpoint: provider.base_url.to_string(),
            })
            .context("Start the server with `ollama serve`");
        }
    }

    tracing::info!("Using {} (model: {})", provider.kind, provider.model);
    Ok(provider)
}

/// Opens a ledger run; a ledger that cannot record does not stop the pipeline
fn start_ledger(storage: &SharedStorage, stage: Stage, config_hash: &str) -> Option<Ledger> {
    match Ledger::start(Arc::clone(storage), stage, config_hash) {
        Ok(ledger) => Some(ledger),
        Err(e) => {
            tracing::warn!("Run ledger unavailable for {}: {}", stage.to_db_string(), e);
            None
        }
    }
}

fn finish_ledger(ledger: &Option<Ledger>, succeeded: bool) {
    if let Some(ledger) = ledger {
        ledger.finish(if succeeded {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        });
    }
}

/// Runs the crawl stage into the raw page directory
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    storage: &SharedStorage,
) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&config.crawler, &config.user_agent)
        .context("Failed to build HTTP client")?;
    let ledger = start_ledger(storage, Stage::Crawl, config_hash);

    let result = run_crawl(config, Arc::new(fetcher), ledger.clone()).await;
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            finish_ledger(&ledger, false);
            return Err(e).context("Crawl failed");
        }
    };

    finish_ledger(&ledger, stats.fetched > 0);
    println!(
        "Crawled {} pages into {} ({} failed, {} skipped)",
        stats.fetched,
        config.output.raw_dir().display(),
        stats.failed,
        stats.skipped
    );

    if stats.fetched == 0 {
        bail!(SiftError::NothingProduced { stage: "crawl" });
    }
    Ok(())
}

/// Runs the clean stage from raw pages into the cleaned directory
async fn handle_clean(
    config: &Config,
    config_hash: &str,
    storage: &SharedStorage,
    provider: &ResolvedProvider,
) -> anyhow::Result<()> {
    let raw = MarkdownStore::new(config.output.raw_dir());
    if raw.list_pages()?.is_empty() {
        bail!(
            "No raw pages found in {}; run the crawl stage first",
            raw.dir().display()
        );
    }

    let chat = ChatProvider::new(provider, &config.transform)
        .context("Failed to build provider client")?;
    let controller = RateLimitController::new(
        Arc::new(chat),
        BackoffPolicy::from(&config.transform.backoff),
        config.transform.max_input_chars,
        config.transform.max_provider_errors,
    );
    let cleaned = MarkdownStore::new(config.output.cleaned_dir());
    let ledger = start_ledger(storage, Stage::Clean, config_hash);

    let result = clean_pages(
        &raw,
        &cleaned,
        &controller,
        config.transform.min_output_chars,
        config.transform.concurrency as usize,
        ledger.as_ref(),
    )
    .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            finish_ledger(&ledger, false);
            return Err(e).context("Clean stage failed");
        }
    };

    finish_ledger(&ledger, report.cleaned > 0);
    println!(
        "Cleaned {}/{} pages into {} ({} skipped, {} failed)",
        report.cleaned,
        report.total,
        cleaned.dir().display(),
        report.skipped,
        report.failed
    );

    if report.cleaned == 0 {
        bail!(SiftError::NothingProduced { stage: "clean" });
    }
    Ok(())
}

/// Runs the export stage from cleaned pages into text files
fn handle_export(config: &Config, config_hash: &str, storage: &SharedStorage) -> anyhow::Result<()> {
    let ledger = start_ledger(storage, Stage::Export, config_hash);
    let max_bytes = config.output.max_upload_bytes;

    let result = export_text(
        &config.output.cleaned_dir(),
        &config.output.txt_dir(),
        &config.output.combined_path(),
        max_bytes,
    );
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            finish_ledger(&ledger, false);
            return Err(e).context("Export failed");
        }
    };

    finish_ledger(&ledger, !report.files.is_empty());
    if report.files.is_empty() {
        bail!(SiftError::NothingProduced { stage: "export" });
    }

    println!(
        "Exported {} files to {} ({})",
        report.files.len(),
        config.output.txt_dir().display(),
        format_bytes(report.total_bytes)
    );
    for file in &report.oversized {
        println!(
            "  WARNING: {} is {}, above the {} upload limit",
            file.name,
            format_bytes(file.bytes),
            format_bytes(max_bytes)
        );
    }
    match &report.combined {
        Some(path) => println!("Combined file: {}", path.display()),
        None => println!(
            "Combined file skipped: total size exceeds {}",
            format_bytes(max_bytes)
        ),
    }

    Ok(())
}

/// Handles the --stats mode: prints the latest runs from the ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.ledger_path))
        .with_context(|| format!("Cannot open ledger {}", config.output.ledger_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --dry-run mode: shows what would run
fn handle_dry_run(config: &Config, stage: StageArg, provider: Option<&ResolvedProvider>) {
    println!("=== Sitesift Dry Run ===\n");

    println!("Stage: {:?}", stage);

    println!("\nCrawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Raw pages: {}", config.output.raw_dir().display());
    println!("  Cleaned pages: {}", config.output.cleaned_dir().display());
    println!("  Text export: {}", config.output.txt_dir().display());
    println!("  Combined file: {}", config.output.combined_path().display());
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  Upload limit: {}", format_bytes(config.output.max_upload_bytes));

    if let Some(provider) = provider {
        let backoff = &config.transform.backoff;
        println!("\nTransform:");
        println!("  Provider: {} ({})", provider.kind, provider.base_url);
        println!("  Model: {}", provider.model);
        println!("  Max input: {} chars", config.transform.max_input_chars);
        println!(
            "  Backoff: base {}ms, ceiling {}ms, floor {}ms",
            backoff.base_ms, backoff.ceiling_ms, backoff.floor_ms
        );
    }

    println!("\n✓ Configuration is valid");
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
