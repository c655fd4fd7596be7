//! Crawler module for Skitter
//!
//! Splits the crawl pipeline into its three moving parts:
//! - `frontier` - the shared FIFO queue and dedup set
//! - `fetcher` - one logical fetch with bounded retries and proxy rotation
//! - `engine` - the worker pool that drives frontier and fetcher to exhaustion

pub mod engine;
pub mod fetcher;
pub mod frontier;

pub use engine::{CrawlEngine, CrawlOptions};
pub use fetcher::{
    CrawlResult, FetchMetadata, HttpResponse, ReqwestTransport, RetryOutcome, RetryableFetcher,
    Transport,
};
pub use frontier::Frontier;
