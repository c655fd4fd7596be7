//! Proxy pool management for Skitter
//!
//! This module tracks per-proxy health from live signal (latency, failures,
//! blocked responses) and selects an outbound proxy per request according to
//! a configured rotation strategy. Proxies that keep getting blocked are
//! evicted from the pool permanently rather than merely deprioritized.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

/// Proxy selection policy
///
/// Ties are always broken by first-seen registration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Cyclic index over the candidate set; the cursor persists across calls
    RoundRobin,
    /// Uniform random choice
    #[default]
    Random,
    /// Proxy with the fewest recorded requests (cold proxies go first)
    LeastUsed,
    /// Proxy with the highest success rate
    BestPerformer,
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "least_used" => Ok(Self::LeastUsed),
            "best_performer" => Ok(Self::BestPerformer),
            other => Err(format!("unknown rotation strategy: {}", other)),
        }
    }
}

/// Mutable per-endpoint health record
///
/// Counters are heuristic routing signal, not correctness-critical state;
/// minor staleness between fields under concurrency is acceptable.
#[derive(Debug, Clone, Default)]
pub struct ProxyHealth {
    /// Total attempts routed through this proxy
    pub requests: u64,

    /// Network-level failures (DNS, connect, timeout)
    pub failures: u64,

    /// Blocked responses (rate limits, server errors in the retry set)
    pub blocked: u64,

    /// Exponential moving average of response latency in milliseconds
    pub avg_latency_ms: f64,
}

impl ProxyHealth {
    /// Fraction of requests that were neither failures nor blocks
    ///
    /// A proxy with no recorded requests gets the benefit of the doubt (1.0).
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 1.0;
        }
        (self.requests - self.failures - self.blocked) as f64 / self.requests as f64
    }

    /// Whether this proxy should stay in the preferred rotation set
    pub fn is_healthy(&self) -> bool {
        self.success_rate() > 0.5 && self.blocked < 10
    }

    fn record_latency(&mut self, latency_ms: f64) {
        if self.avg_latency_ms == 0.0 {
            // First sample seeds the average outright.
            self.avg_latency_ms = latency_ms;
        } else {
            self.avg_latency_ms = self.avg_latency_ms * 0.9 + latency_ms * 0.1;
        }
    }
}

/// Blocked-response count past which a proxy is evicted from the pool
const EVICTION_THRESHOLD: u64 = 20;

struct RegistryInner {
    /// Endpoints in first-seen order (drives tie-breaking)
    endpoints: Vec<String>,
    health: HashMap<String, ProxyHealth>,
    /// Round-robin cursor, persisted across select() calls
    cursor: usize,
}

/// Tracks proxy endpoints and per-proxy health; selects one proxy per request
///
/// The registry exclusively owns all health records. Workers only ask for a
/// selection and report outcomes back; they never touch health state directly.
pub struct ProxyRegistry {
    strategy: RotationStrategy,
    inner: Mutex<RegistryInner>,
}

impl ProxyRegistry {
    /// Creates a registry with the given endpoints and selection strategy
    pub fn new<I, S>(endpoints: I, strategy: RotationStrategy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self {
            strategy,
            inner: Mutex::new(RegistryInner {
                endpoints: Vec::new(),
                health: HashMap::new(),
                cursor: 0,
            }),
        };
        for endpoint in endpoints {
            registry.add(endpoint.into());
        }
        registry
    }

    /// Creates an empty registry (all requests go direct)
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new(), RotationStrategy::default())
    }

    /// Loads a registry from a proxy list file
    ///
    /// One proxy URL per line; blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path, strategy: RotationStrategy) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let endpoints: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        Ok(Self::new(endpoints, strategy))
    }

    /// Registers a proxy with zeroed health; already-known endpoints are a no-op
    pub fn add(&self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        let mut inner = self.inner.lock().unwrap();
        if !inner.health.contains_key(&endpoint) {
            inner.endpoints.push(endpoint.clone());
            inner.health.insert(endpoint, ProxyHealth::default());
        }
    }

    /// Removes a proxy and its health record
    pub fn remove(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoints.retain(|e| e != endpoint);
        inner.health.remove(endpoint);
    }

    /// Selects a proxy for the next request
    ///
    /// Prefers the healthy subset, falls back to the full pool when nothing
    /// is healthy, and returns `None` when the pool is empty (the caller
    /// proceeds without a proxy).
    pub fn select(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.endpoints.is_empty() {
            return None;
        }

        let healthy: Vec<String> = inner
            .endpoints
            .iter()
            .filter(|e| inner.health.get(*e).is_some_and(|h| h.is_healthy()))
            .cloned()
            .collect();
        let candidates = if healthy.is_empty() {
            inner.endpoints.clone()
        } else {
            healthy
        };

        let chosen = match self.strategy {
            RotationStrategy::RoundRobin => {
                inner.cursor = (inner.cursor + 1) % candidates.len();
                candidates[inner.cursor].clone()
            }
            RotationStrategy::Random => {
                use rand::seq::SliceRandom;
                candidates
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .unwrap_or_else(|| candidates[0].clone())
            }
            RotationStrategy::LeastUsed => {
                let mut best = candidates[0].clone();
                let mut best_requests = inner.health[&best].requests;
                for endpoint in &candidates[1..] {
                    let requests = inner.health[endpoint].requests;
                    if requests < best_requests {
                        best = endpoint.clone();
                        best_requests = requests;
                    }
                }
                best
            }
            RotationStrategy::BestPerformer => {
                let mut best = candidates[0].clone();
                let mut best_rate = inner.health[&best].success_rate();
                for endpoint in &candidates[1..] {
                    let rate = inner.health[endpoint].success_rate();
                    if rate > best_rate {
                        best = endpoint.clone();
                        best_rate = rate;
                    }
                }
                best
            }
        };

        Some(chosen)
    }

    /// Records a successful request and folds the latency into the EMA
    pub fn report_success(&self, endpoint: &str, latency_ms: f64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(health) = inner.health.get_mut(endpoint) {
            health.requests += 1;
            health.record_latency(latency_ms);
        }
    }

    /// Records a network-level failure
    pub fn report_failure(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(health) = inner.health.get_mut(endpoint) {
            health.requests += 1;
            health.failures += 1;
        }
    }

    /// Records a blocked response; evicts the proxy once it crosses the
    /// block threshold
    ///
    /// Eviction is permanent removal from the pool, not deprioritization.
    pub fn report_blocked(&self, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        let evict = match inner.health.get_mut(endpoint) {
            Some(health) => {
                health.requests += 1;
                health.blocked += 1;
                health.blocked > EVICTION_THRESHOLD
            }
            None => false,
        };

        if evict {
            tracing::warn!("Evicting proxy {} after repeated blocks", endpoint);
            inner.endpoints.retain(|e| e != endpoint);
            inner.health.remove(endpoint);
        }
    }

    /// Returns the number of registered proxies
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().endpoints.len()
    }

    /// Returns whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all health records in first-seen order
    pub fn stats(&self) -> Vec<(String, ProxyHealth)> {
        let inner = self.inner.lock().unwrap();
        inner
            .endpoints
            .iter()
            .filter_map(|e| inner.health.get(e).map(|h| (e.clone(), h.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(endpoints: &[&str], strategy: RotationStrategy) -> ProxyRegistry {
        ProxyRegistry::new(endpoints.iter().copied(), strategy)
    }

    #[test]
    fn test_empty_pool_selects_none() {
        let registry = ProxyRegistry::empty();
        for _ in 0..5 {
            assert_eq!(registry.select(), None);
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = ProxyRegistry::empty();
        registry.add("http://p1:8080");
        registry.add("http://p1:8080");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_deletes_health() {
        let registry = registry_with(&["http://p1:8080"], RotationStrategy::RoundRobin);
        registry.remove("http://p1:8080");
        assert!(registry.is_empty());
        assert_eq!(registry.select(), None);
    }

    #[test]
    fn test_round_robin_cycles() {
        let registry = registry_with(
            &["http://p1:8080", "http://p2:8080", "http://p3:8080"],
            RotationStrategy::RoundRobin,
        );

        let picks: Vec<String> = (0..6).map(|_| registry.select().unwrap()).collect();
        // Cursor starts at 0 and advances before indexing, so p2 goes first.
        assert_eq!(picks[0], "http://p2:8080");
        assert_eq!(picks[1], "http://p3:8080");
        assert_eq!(picks[2], "http://p1:8080");
        assert_eq!(picks[..3], picks[3..]);
    }

    #[test]
    fn test_least_used_prefers_cold_proxy() {
        let registry = registry_with(
            &["http://p1:8080", "http://p2:8080"],
            RotationStrategy::LeastUsed,
        );

        registry.report_success("http://p1:8080", 100.0);
        assert_eq!(registry.select().unwrap(), "http://p2:8080");
    }

    #[test]
    fn test_best_performer_prefers_high_success_rate() {
        let registry = registry_with(
            &["http://p1:8080", "http://p2:8080"],
            RotationStrategy::BestPerformer,
        );

        // p1: 1/2 success; p2: 2/2 success.
        registry.report_success("http://p1:8080", 100.0);
        registry.report_failure("http://p1:8080");
        registry.report_success("http://p2:8080", 100.0);
        registry.report_success("http://p2:8080", 100.0);

        assert_eq!(registry.select().unwrap(), "http://p2:8080");
    }

    #[test]
    fn test_ties_broken_by_first_seen_order() {
        let registry = registry_with(
            &["http://p1:8080", "http://p2:8080"],
            RotationStrategy::LeastUsed,
        );
        // Both cold: first registered wins.
        assert_eq!(registry.select().unwrap(), "http://p1:8080");
    }

    #[test]
    fn test_unhealthy_proxy_skipped() {
        let registry = registry_with(
            &["http://bad:8080", "http://good:8080"],
            RotationStrategy::LeastUsed,
        );

        // 10 blocks makes the proxy unhealthy but not yet evicted.
        for _ in 0..10 {
            registry.report_blocked("http://bad:8080");
        }
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.select().unwrap(), "http://good:8080");
    }

    #[test]
    fn test_falls_back_to_full_pool_when_none_healthy() {
        let registry = registry_with(&["http://p1:8080"], RotationStrategy::Random);
        for _ in 0..10 {
            registry.report_blocked("http://p1:8080");
        }
        // Unhealthy but still registered, so it is still selected.
        assert_eq!(registry.select().unwrap(), "http://p1:8080");
    }

    #[test]
    fn test_eviction_after_block_threshold() {
        let registry = registry_with(
            &["http://bad:8080", "http://good:8080"],
            RotationStrategy::RoundRobin,
        );

        for _ in 0..21 {
            registry.report_blocked("http://bad:8080");
        }

        assert_eq!(registry.len(), 1);
        for _ in 0..10 {
            assert_eq!(registry.select().unwrap(), "http://good:8080");
        }
    }

    #[test]
    fn test_success_rate_with_no_requests() {
        let health = ProxyHealth::default();
        assert_eq!(health.success_rate(), 1.0);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_latency_ema() {
        let registry = registry_with(&["http://p1:8080"], RotationStrategy::Random);
        registry.report_success("http://p1:8080", 100.0);
        registry.report_success("http://p1:8080", 200.0);

        let stats = registry.stats();
        let (_, health) = &stats[0];
        // First sample seeds the average; second blends 0.9/0.1.
        assert!((health.avg_latency_ms - 110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "round_robin".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::RoundRobin
        );
        assert_eq!(
            "best_performer".parse::<RotationStrategy>().unwrap(),
            RotationStrategy::BestPerformer
        );
        assert!("fastest".parse::<RotationStrategy>().is_err());
    }
}
