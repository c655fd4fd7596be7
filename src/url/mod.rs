//! URL handling module for Skitter
//!
//! Provides domain extraction and same-domain link extraction from HTML.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts the domain from a URL
///
/// Retrieves the host portion of a URL and converts it to lowercase. Returns
/// None for URLs with no host (which shouldn't happen for valid HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use skitter::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts same-domain links from an HTML document
///
/// Walks every `a[href]` element, resolves relative references against
/// `base_url`, keeps only links whose host matches the base URL's host, and
/// deduplicates per page while preserving document order.
///
/// # Arguments
///
/// * `html` - The page body
/// * `base_url` - The URL the page was fetched from
///
/// # Returns
///
/// Absolute, deduplicated same-domain URLs in document order
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector is valid");
    let base_domain = extract_domain(base_url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let resolved = match base_url.join(href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unresolvable href '{}': {}", href, e);
                continue;
            }
        };

        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        if extract_domain(&resolved) != base_domain {
            continue;
        }

        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }

    links
}
