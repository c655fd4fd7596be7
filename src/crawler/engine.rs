//! Crawl engine - worker pool orchestration
//!
//! Owns the frontier and runs W concurrent workers over it. Each worker loops
//! dequeue → fetch → save → extract/enqueue links until the frontier is
//! exhausted (queue drained and nothing in flight). Results reach the sink in
//! completion order; no ordering between them is guaranteed. Every URL the
//! frontier accepts ends as exactly one of a crawl result or a logged
//! abandonment.

use crate::config::Config;
use crate::crawler::fetcher::{CrawlResult, RetryableFetcher};
use crate::crawler::frontier::Frontier;
use crate::proxy::ProxyRegistry;
use crate::stealth::StealthProvider;
use crate::storage::Sink;
use crate::url::extract_links;
use crate::{Result, SkitterError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// How long a worker waits on an empty queue before probing for completion
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-crawl options
#[derive(Clone, Default)]
pub struct CrawlOptions {
    /// Follow same-domain links found on 200 pages
    pub follow_links: bool,

    /// Additional predicate applied to extracted links before enqueueing
    pub link_filter: Option<Arc<dyn Fn(&Url) -> bool + Send + Sync>>,
}

/// Worker pool that drives a crawl run
pub struct CrawlEngine {
    config: Arc<Config>,
    fetcher: Arc<RetryableFetcher>,
}

impl CrawlEngine {
    /// Creates an engine with the production fetcher
    pub fn new(
        config: Config,
        registry: Arc<ProxyRegistry>,
        stealth: Arc<dyn StealthProvider>,
    ) -> Self {
        let fetcher = Arc::new(RetryableFetcher::new(&config, registry, stealth));
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }

    /// Creates an engine over a caller-supplied fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<RetryableFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }

    /// Crawls from a seed URL until the frontier is exhausted
    ///
    /// Seeds the frontier, launches the worker pool, joins it, closes the
    /// sink exactly once, and returns the accumulated results in completion
    /// order.
    ///
    /// # Arguments
    ///
    /// * `seed_url` - Starting URL
    /// * `options` - Link-following behavior
    /// * `sink` - Optional persistence collaborator; `save` is called per
    ///   result, `close` once at the end
    pub async fn crawl(
        &self,
        seed_url: &str,
        options: CrawlOptions,
        sink: Option<Arc<dyn Sink>>,
    ) -> Result<Vec<CrawlResult>> {
        // Reject unparseable seeds up front rather than burning retries.
        Url::parse(seed_url)?;

        let max_pages = self.config.crawler.max_requests_per_crawl;
        let workers = self.config.crawler.max_concurrent_requests;

        let frontier = Arc::new(Frontier::new(max_pages));
        frontier.seed(seed_url);

        let results: Arc<Mutex<Vec<CrawlResult>>> = Arc::new(Mutex::new(Vec::new()));
        let dequeued = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            "Starting crawl of {} with {} workers, budget {} pages",
            seed_url,
            workers,
            max_pages
        );

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let frontier = Arc::clone(&frontier);
            let fetcher = Arc::clone(&self.fetcher);
            let results = Arc::clone(&results);
            let dequeued = Arc::clone(&dequeued);
            let sink = sink.clone();
            let options = options.clone();

            handles.push(tokio::spawn(async move {
                worker_loop(
                    worker_id, frontier, fetcher, results, dequeued, max_pages, options, sink,
                )
                .await;
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| SkitterError::WorkerPanic(e.to_string()))?;
        }

        // Workers have all exited, so no further save() can happen.
        if let Some(sink) = sink {
            sink.close().await.map_err(SkitterError::Sink)?;
        }

        let results = Arc::try_unwrap(results)
            .map_err(|_| SkitterError::WorkerPanic("results still shared after join".into()))?
            .into_inner()
            .unwrap();

        tracing::info!("Crawl complete: {} pages", results.len());
        Ok(results)
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    frontier: Arc<Frontier>,
    fetcher: Arc<RetryableFetcher>,
    results: Arc<Mutex<Vec<CrawlResult>>>,
    dequeued: Arc<AtomicUsize>,
    max_pages: usize,
    options: CrawlOptions,
    sink: Option<Arc<dyn Sink>>,
) {
    tracing::debug!("Worker {} started", worker_id);

    loop {
        let Some(url) = frontier.dequeue(DEQUEUE_TIMEOUT).await else {
            if frontier.is_exhausted() {
                break;
            }
            // Another worker still holds an item that may enqueue more.
            continue;
        };

        // Budget re-check at dequeue time: the queue can hold more items
        // than the remaining budget when the cap was reached mid-run.
        if dequeued.fetch_add(1, Ordering::SeqCst) >= max_pages {
            tracing::debug!("Worker {} dropping {} (past page budget)", worker_id, url);
            frontier.task_done();
            continue;
        }

        match fetcher.fetch(&url).await {
            Some(result) => {
                if let Some(sink) = &sink {
                    if let Err(e) = sink.save(&result).await {
                        // Fatal to this item only, not the crawl.
                        tracing::error!("Failed to persist {}: {}", url, e);
                    }
                }

                tracing::info!("✓ {} ({})", url, result.status_code);

                if options.follow_links && result.status_code == 200 {
                    enqueue_links(&frontier, &url, &result.content, options.link_filter.as_ref());
                }

                results.lock().unwrap().push(result);
            }
            None => {
                // Retries exhausted; the URL is abandoned, never re-queued.
                tracing::warn!("✗ {} abandoned", url);
            }
        }

        frontier.task_done();
    }

    tracing::debug!("Worker {} finished", worker_id);
}

/// Extracts links from a fetched page and feeds survivors to the frontier
fn enqueue_links(
    frontier: &Frontier,
    url: &str,
    content: &str,
    link_filter: Option<&Arc<dyn Fn(&Url) -> bool + Send + Sync>>,
) {
    let base = match Url::parse(url) {
        Ok(base) => base,
        Err(e) => {
            tracing::debug!("Cannot resolve links against {}: {}", url, e);
            return;
        }
    };

    for link in extract_links(content, &base) {
        if link_filter.map_or(true, |filter| filter(&link)) {
            frontier.try_enqueue(link.as_str());
        }
    }
}
