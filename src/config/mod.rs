//! Configuration module for Skitter
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use skitter::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("skitter.toml")).unwrap();
//! println!("Page budget: {}", config.crawler.max_requests_per_crawl);
//! ```

mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, ProxyConfig, StealthConfig};
pub use validation::validate;

use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}
