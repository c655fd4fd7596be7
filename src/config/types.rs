use crate::proxy::RotationStrategy;
use crate::storage::OutputFormat;
use serde::Deserialize;

/// Main configuration structure for Skitter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub stealth: StealthConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages accepted into one crawl run (page budget)
    #[serde(rename = "max-requests-per-crawl", default = "default_max_requests")]
    pub max_requests_per_crawl: usize,

    /// Number of concurrent workers sharing the frontier
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: usize,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum fetch attempts per URL before abandoning it
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Status codes that trigger proxy rotation and a retry
    #[serde(
        rename = "retryable-status-codes",
        default = "default_retryable_codes"
    )]
    pub retryable_status_codes: Vec<u16>,

    /// Whether workers extract and enqueue same-domain links from 200 pages
    #[serde(rename = "follow-links", default)]
    pub follow_links: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_crawl: default_max_requests(),
            max_concurrent_requests: default_concurrency(),
            request_timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retryable_status_codes: default_retryable_codes(),
            follow_links: false,
        }
    }
}

/// Proxy pool configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Outbound proxy URLs (empty pool means all requests go direct)
    #[serde(default)]
    pub urls: Vec<String>,

    /// Selection policy: round_robin, random, least_used, best_performer
    #[serde(rename = "rotation-strategy", default)]
    pub rotation_strategy: RotationStrategy,
}

/// Human-like delay configuration for blocked-response backoff
#[derive(Debug, Clone, Deserialize)]
pub struct StealthConfig {
    /// Lower bound for the randomized retry delay (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound for the randomized retry delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Output file path; results are kept in memory only when unset
    #[serde(default)]
    pub path: Option<String>,

    /// Output format for the sink
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_max_requests() -> usize {
    1000
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_retryable_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_min_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    3000
}
