//! Bing Web Search API (v7).

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.bing.microsoft.com/v7.0/search";
const MAX_RESULTS: usize = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BingResponse {
    web_pages: WebPages,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebPages {
    value: Vec<BingItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BingItem {
    name: String,
    url: String,
    snippet: String,
}

/// Bing Web Search provider.
#[derive(Debug, Clone)]
pub struct BingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl BingProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
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
impl Provider for BingProvider {
    fn name(&self) -> &str {
        "BingSearch"
    }

    fn priority(&self) -> f64 {
        3.0
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "Bing search");
        let count = num_results.clamp(1, MAX_RESULTS).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("count", count.as_str()),
                ("offset", "0"),
                ("mkt", "en-US"),
                ("safesearch", "Moderate"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Bing", e))?;

        let data: BingResponse = check_status("Bing", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Bing response: {e}")))?;

        let results: Vec<SearchResult> = data
            .web_pages
            .value
            .into_iter()
            .take(num_results)
            .map(|item| SearchResult::new(item.name, item.url, item.snippet, "bing"))
            .collect();

        tracing::debug!(count = results.len(), "Bing results parsed");
        Ok(results)
    }
}
