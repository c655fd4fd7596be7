//! Retryable HTTP fetcher
//!
//! Performs one logical fetch with bounded retries. Each attempt consults the
//! proxy registry for a route and reports the outcome back, so proxy health
//! reflects live traffic. A blocked status (rate limit / server error in the
//! configured retry set) rotates to another proxy after a humanized delay; a
//! transport error retries after a short fixed sleep; every other status,
//! 404 included, is a terminal response and ends the attempt loop.

use crate::config::Config;
use crate::proxy::ProxyRegistry;
use crate::stealth::StealthProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed sleep between attempts after a network-level failure
const NETWORK_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-attempt details attached to a crawl result
#[derive(Debug, Clone, Serialize)]
pub struct FetchMetadata {
    /// Wall time from request start to response body, in milliseconds
    pub elapsed_ms: u64,

    /// Proxy the winning attempt was routed through, if any
    pub proxy: Option<String>,

    /// 1-based attempt number that produced the terminal response
    pub attempt: u32,
}

/// Immutable record of one terminal fetch
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub url: String,
    pub status_code: u16,
    pub content: String,
    pub headers: HashMap<String, String>,
    pub metadata: FetchMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Classification of a single fetch attempt
#[derive(Debug)]
pub enum RetryOutcome {
    /// Terminal response (any status outside the retry set)
    Success(HttpResponse),
    /// Status in the retry set; rotate proxy and try again
    Blocked(u16),
    /// DNS/connect/timeout/body error; try again after a fixed delay
    NetworkError(String),
}

/// Raw response handed back by a transport
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// One GET attempt over some transport
///
/// The production transport builds a fresh reqwest client per attempt so the
/// proxy route is attempt-local state; a client shared across concurrent
/// workers must never have its proxy mutated mid-flight. Tests substitute a
/// fake transport to exercise rotation without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponse, String>;
}

/// reqwest-backed transport with per-attempt client construction
pub struct ReqwestTransport;

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        proxy: Option<&str>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponse, String> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true);

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| format!("invalid proxy {}: {}", proxy_url, e))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| e.to_string())?;

        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                e.to_string()
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

/// Fetches one URL with bounded retries and proxy rotation
pub struct RetryableFetcher {
    transport: Arc<dyn Transport>,
    registry: Arc<ProxyRegistry>,
    stealth: Arc<dyn StealthProvider>,
    timeout: Duration,
    max_retries: u32,
    retryable_status_codes: Vec<u16>,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryableFetcher {
    /// Creates a fetcher over the production reqwest transport
    pub fn new(
        config: &Config,
        registry: Arc<ProxyRegistry>,
        stealth: Arc<dyn StealthProvider>,
    ) -> Self {
        Self::with_transport(config, registry, stealth, Arc::new(ReqwestTransport))
    }

    /// Creates a fetcher over a caller-supplied transport
    pub fn with_transport(
        config: &Config,
        registry: Arc<ProxyRegistry>,
        stealth: Arc<dyn StealthProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            registry,
            stealth,
            timeout: Duration::from_millis(config.crawler.request_timeout_ms),
            max_retries: config.crawler.max_retries,
            retryable_status_codes: config.crawler.retryable_status_codes.clone(),
            min_delay_ms: config.stealth.min_delay_ms,
            max_delay_ms: config.stealth.max_delay_ms,
        }
    }

    /// Fetches a URL, returning `None` once all attempts are exhausted
    ///
    /// Exhaustion is final: the URL is abandoned with a log line, never
    /// re-queued. This method never panics or surfaces an error to the
    /// worker loop.
    pub async fn fetch(&self, url: &str) -> Option<CrawlResult> {
        for attempt in 1..=self.max_retries {
            let proxy = self.registry.select();
            let headers = self.stealth.headers();
            let started = Instant::now();

            let outcome = match self
                .transport
                .get(url, proxy.as_deref(), &headers, self.timeout)
                .await
            {
                Ok(response) if self.retryable_status_codes.contains(&response.status_code) => {
                    RetryOutcome::Blocked(response.status_code)
                }
                Ok(response) => RetryOutcome::Success(response),
                Err(error) => RetryOutcome::NetworkError(error),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                RetryOutcome::Success(response) => {
                    if let Some(endpoint) = &proxy {
                        self.registry.report_success(endpoint, elapsed_ms as f64);
                    }
                    return Some(CrawlResult {
                        url: url.to_string(),
                        status_code: response.status_code,
                        content: response.body,
                        headers: response.headers,
                        metadata: FetchMetadata {
                            elapsed_ms,
                            proxy,
                            attempt,
                        },
                        timestamp: Utc::now(),
                    });
                }

                RetryOutcome::Blocked(status) => {
                    if let Some(endpoint) = &proxy {
                        self.registry.report_blocked(endpoint);
                    }
                    tracing::warn!(
                        "{} blocked ({}) on attempt {}/{}, rotating proxy",
                        url,
                        status,
                        attempt,
                        self.max_retries
                    );
                    let delay = self.stealth.delay_ms(self.min_delay_ms, self.max_delay_ms);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }

                RetryOutcome::NetworkError(error) => {
                    if let Some(endpoint) = &proxy {
                        self.registry.report_failure(endpoint);
                    }
                    tracing::warn!(
                        "{} network error on attempt {}/{}: {}",
                        url,
                        attempt,
                        self.max_retries,
                        error
                    );
                    tokio::time::sleep(NETWORK_RETRY_DELAY).await;
                }
            }
        }

        tracing::error!("{} abandoned after {} attempts", url, self.max_retries);
        None
    }
}
