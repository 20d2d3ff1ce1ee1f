//! Google Custom Search JSON API.

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// The API never returns more than 10 items per request.
const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_link: String,
}

/// Google Custom Search provider. Needs both an API key and an engine id.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    cse_id: String,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, cse_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            cse_id: cse_id.into(),
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
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "GoogleSearch"
    }

    fn priority(&self) -> f64 {
        1.0
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty() && !self.cse_id.is_empty()
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "Google search");
        let num = num_results.clamp(1, MAX_RESULTS).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("safe", "active"),
                ("fields", "items(title,link,snippet,displayLink)"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Google", e))?;

        let data: GoogleResponse = check_status("Google", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Google response: {e}")))?;

        let results: Vec<SearchResult> = data
            .items
            .into_iter()
            .take(num_results)
            .map(|item| {
                SearchResult::new(item.title, item.link, item.snippet, "google")
                    .with_metadata("display_link", item.display_link)
            })
            .collect();

        tracing::debug!(count = results.len(), "Google results parsed");
        Ok(results)
    }
}
