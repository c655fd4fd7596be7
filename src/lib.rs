//! Skitter: a concurrent web crawler with proxy rotation
//!
//! This crate implements a budget-bounded crawler that spreads requests across
//! a worker pool and a rotating pool of outbound proxies, detecting blocks
//! (rate limits, bans) from live signal and recovering without operator help.

pub mod config;
pub mod crawler;
pub mod proxy;
pub mod stealth;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Skitter operations
#[derive(Debug, Error)]
pub enum SkitterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("Sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Worker task failed: {0}")]
    WorkerPanic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Skitter operations
pub type Result<T> = std::result::Result<T, SkitterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlOptions, CrawlResult, RetryableFetcher};
pub use proxy::{ProxyHealth, ProxyRegistry, RotationStrategy};
pub use stealth::{StealthEngine, StealthProvider};
pub use storage::{open_sink, Sink};
