//! Exa neural search API.

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.exa.ai/search";
const MAX_RESULTS: usize = 20;
/// Page text longer than this is cut and suffixed with `...`.
const SNIPPET_CHARS: usize = 300;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExaResponse {
    results: Vec<ExaItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExaItem {
    title: Option<String>,
    url: String,
    text: Option<String>,
}

/// Exa search provider.
#[derive(Debug, Clone)]
pub struct ExaProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExaProvider {
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
impl Provider for ExaProvider {
    fn name(&self) -> &str {
        "ExaSearch"
    }

    fn priority(&self) -> f64 {
        1.8
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(120))
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "Exa search");

        let payload = serde_json::json!({
            "query": query,
            "numResults": num_results.clamp(1, MAX_RESULTS),
            "useAutoprompt": true,
            "contents": { "text": true },
        });
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("Exa", e))?;

        let data: ExaResponse = check_status("Exa", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Exa response: {e}")))?;

        let results: Vec<SearchResult> = data
            .results
            .into_iter()
            .filter(|item| !item.url.is_empty())
            .take(num_results)
            .map(|item| {
                let title = item
                    .title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "No title".to_owned());
                let snippet = truncate_snippet(item.text.as_deref().unwrap_or_default());
                SearchResult::new(title, item.url, snippet, "exa")
            })
            .collect();

        tracing::debug!(count = results.len(), "Exa results parsed");
        Ok(results)
    }
}

fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(SNIPPET_CHARS).collect();
    cut.push_str("...");
    cut
}
