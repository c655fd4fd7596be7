//! Request fingerprint generation
//!
//! This module produces realistic browser request headers and humanized retry
//! delays so the crawler's traffic does not form the fixed patterns rate
//! limiters key on. Headers are regenerated for every attempt, never cached.

use rand::Rng;
use std::collections::HashMap;

/// Pool of current desktop browser user agents
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "pt-BR,pt;q=0.9,en;q=0.8",
    "es-ES,es;q=0.9,en;q=0.8",
    "de-DE,de;q=0.9,en;q=0.8",
];

/// Provides request headers and retry delays for the fetcher
///
/// The crawler only depends on this interface; the default implementation
/// below can be swapped out in tests or by embedders.
pub trait StealthProvider: Send + Sync {
    /// Returns a full realistic header set, regenerated on every call
    fn headers(&self) -> HashMap<String, String>;

    /// Returns a randomized human-like delay in milliseconds within [min, max]
    fn delay_ms(&self, min_ms: u64, max_ms: u64) -> u64;
}

/// Default stealth implementation backed by a user-agent pool
#[derive(Debug, Default)]
pub struct StealthEngine;

impl StealthEngine {
    pub fn new() -> Self {
        Self
    }

    fn user_agent(&self) -> &'static str {
        let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
        USER_AGENTS[idx]
    }
}

impl StealthProvider for StealthEngine {
    fn headers(&self) -> HashMap<String, String> {
        let mut rng = rand::thread_rng();
        let language = ACCEPT_LANGUAGES[rng.gen_range(0..ACCEPT_LANGUAGES.len())];
        drop(rng);

        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), self.user_agent().to_string());
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        );
        headers.insert("Accept-Language".to_string(), language.to_string());
        headers.insert("Accept-Encoding".to_string(), "gzip, deflate, br".to_string());
        headers.insert("DNT".to_string(), "1".to_string());
        headers.insert("Connection".to_string(), "keep-alive".to_string());
        headers.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());
        headers.insert("Sec-Fetch-Dest".to_string(), "document".to_string());
        headers.insert("Sec-Fetch-Mode".to_string(), "navigate".to_string());
        headers.insert("Sec-Fetch-Site".to_string(), "none".to_string());
        headers.insert("Sec-Fetch-User".to_string(), "?1".to_string());
        headers.insert("Cache-Control".to_string(), "max-age=0".to_string());
        headers
    }

    fn delay_ms(&self, min_ms: u64, max_ms: u64) -> u64 {
        if min_ms >= max_ms {
            return min_ms;
        }
        // Sum of two uniform draws approximates a bell curve around the
        // midpoint, which reads more human than a flat distribution.
        let mut rng = rand::thread_rng();
        let half = (max_ms - min_ms) / 2;
        let sample = min_ms + rng.gen_range(0..=half) + rng.gen_range(0..=max_ms - min_ms - half);
        sample.clamp(min_ms, max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_contain_full_set() {
        let stealth = StealthEngine::new();
        let headers = stealth.headers();

        assert!(headers.contains_key("User-Agent"));
        assert!(headers.contains_key("Accept"));
        assert!(headers.contains_key("Accept-Language"));
        assert!(headers.contains_key("Sec-Fetch-Mode"));
        assert!(headers["User-Agent"].starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_headers_regenerated_per_call() {
        let stealth = StealthEngine::new();
        // With an 8-entry UA pool, 64 draws produce at least two distinct
        // agents unless the RNG is broken.
        let agents: std::collections::HashSet<String> = (0..64)
            .map(|_| stealth.headers().remove("User-Agent").unwrap())
            .collect();
        assert!(agents.len() > 1);
    }

    #[test]
    fn test_delay_within_bounds() {
        let stealth = StealthEngine::new();
        for _ in 0..100 {
            let delay = stealth.delay_ms(500, 3000);
            assert!((500..=3000).contains(&delay));
        }
    }

    #[test]
    fn test_delay_degenerate_bounds() {
        let stealth = StealthEngine::new();
        assert_eq!(stealth.delay_ms(250, 250), 250);
    }
}
