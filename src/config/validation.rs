use crate::config::types::{Config, CrawlerConfig, ProxyConfig, StealthConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_proxy_config(&config.proxy)?;
    validate_stealth_config(&config.stealth)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_requests_per_crawl < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests_per_crawl must be >= 1, got {}",
            config.max_requests_per_crawl
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 200 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 200, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for url in &config.urls {
        Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", url, e)))?;
    }
    Ok(())
}

/// Validates stealth delay bounds
fn validate_stealth_config(config: &StealthConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }
    Ok(())
}
