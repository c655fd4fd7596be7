//! Skitter main entry point
//!
//! Command-line interface for the Skitter web crawler.

use anyhow::Context;
use clap::Parser;
use skitter::config::{load_config, validate, Config};
use skitter::crawler::{CrawlEngine, CrawlOptions};
use skitter::proxy::{ProxyRegistry, RotationStrategy};
use skitter::stealth::StealthEngine;
use skitter::storage::{open_sink, OutputFormat, Sink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Skitter: a concurrent web crawler with proxy rotation
///
/// Skitter fetches pages under a global budget, spreading requests across a
/// worker pool and a rotating pool of outbound proxies, recovering from rate
/// limits and bans without operator intervention.
#[derive(Parser, Debug)]
#[command(name = "skitter")]
#[command(version)]
#[command(about = "Concurrent web crawler with proxy rotation", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum pages to crawl
    #[arg(short, long)]
    pages: Option<usize>,

    /// Number of concurrent workers
    #[arg(short, long)]
    concurrent: Option<usize>,

    /// Follow same-domain links found on pages
    #[arg(short = 'F', long)]
    follow: bool,

    /// Output file path (results stay in memory when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: json, csv, sqlite
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// File with proxy URLs, one per line
    #[arg(long, value_name = "FILE")]
    proxy_file: Option<PathBuf>,

    /// Proxy rotation strategy: round_robin, random, least_used, best_performer
    #[arg(long)]
    strategy: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum fetch attempts per URL
    #[arg(short, long)]
    retries: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let strategy = match &cli.strategy {
        Some(name) => name
            .parse::<RotationStrategy>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.proxy.rotation_strategy,
    };

    // Proxy pool: file takes precedence over the config list.
    let registry = match &cli.proxy_file {
        Some(path) => {
            let registry = ProxyRegistry::from_file(path, strategy)
                .with_context(|| format!("Failed to read proxy file {}", path.display()))?;
            tracing::info!("Loaded {} proxies from {}", registry.len(), path.display());
            registry
        }
        None => ProxyRegistry::new(config.proxy.urls.clone(), strategy),
    };

    // CLI output flag wins over the config file's output section.
    let output_path = cli
        .output
        .clone()
        .or_else(|| config.output.path.as_ref().map(PathBuf::from));
    let sink: Option<Arc<dyn Sink>> = match &output_path {
        Some(path) => {
            let format = cli.format.unwrap_or(config.output.format);
            tracing::info!("Writing results to {} ({:?})", path.display(), format);
            Some(open_sink(path, format)?)
        }
        None => None,
    };

    let options = CrawlOptions {
        follow_links: cli.follow || config.crawler.follow_links,
        link_filter: None,
    };

    let engine = CrawlEngine::new(config, Arc::new(registry), Arc::new(StealthEngine::new()));
    let results = engine
        .crawl(&cli.url, options, sink)
        .await
        .context("Crawl failed")?;

    println!("Crawled {} pages", results.len());
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skitter=info,warn"),
            1 => EnvFilter::new("skitter=debug,info"),
            2 => EnvFilter::new("skitter=trace,debug"),
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

/// Loads the config file (when given) and applies CLI overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(pages) = cli.pages {
        config.crawler.max_requests_per_crawl = pages;
    }
    if let Some(concurrent) = cli.concurrent {
        config.crawler.max_concurrent_requests = concurrent;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.request_timeout_ms = timeout * 1000;
    }
    if let Some(retries) = cli.retries {
        config.crawler.max_retries = retries;
    }

    validate(&config)?;
    Ok(config)
}
