//! DuckDuckGo HTML search. Needs no API key.
//!
//! Posts to the HTML-only endpoint at `https://html.duckduckgo.com/html/`,
//! which requires no JavaScript, and scrapes the result list.

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo HTML scraper provider.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "DuckDuckGoSearch"
    }

    fn priority(&self) -> f64 {
        2.0
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(query, "DuckDuckGo search");

        let response = self
            .client
            .post(&self.base_url)
            .form(&[("q", query), ("kl", "us-en"), ("kp", "-1")])
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| transport_error("DuckDuckGo", e))?;

        let html = check_status("DuckDuckGo", response)?
            .text()
            .await
            .map_err(|e| transport_error("DuckDuckGo", e))?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");
        parse_duckduckgo_html(&html, num_results)
    }
}

/// Extract the target URL from DuckDuckGo's redirect wrapper.
///
/// DDG wraps URLs like `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`;
/// the `uddg` query parameter holds the real, URL-encoded target.
fn extract_url(href: &str) -> Option<String> {
    let full_href = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };

    let parsed = Url::parse(&full_href).ok()?;

    if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
    } else {
        Some(full_href)
    }
}

/// Parse the DuckDuckGo HTML result page, skipping ads.
pub(crate) fn parse_duckduckgo_html(
    html: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_owned();
        if title.is_empty() {
            continue;
        }

        let Some(link) = title_el.value().attr("href").and_then(extract_url) else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_owned())
            .unwrap_or_default();

        results.push(SearchResult::new(title, link, snippet, "duckduckgo"));
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}
