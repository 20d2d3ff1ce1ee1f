//! Jina search API.
//!
//! Small requests use the `GET s.jina.ai/<query>` endpoint; more than ten
//! results go through the POST search API. Both need an API key, so the
//! provider is always registered but only available with one.

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://s.jina.ai/";
const DEFAULT_PREMIUM_URL: &str = "https://api.jina.ai/v1/search";
const BASIC_MAX_RESULTS: usize = 10;
const MAX_RESULTS: usize = 100;

/// Jina search provider.
#[derive(Debug, Clone)]
pub struct JinaProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    premium_url: String,
}

impl JinaProvider {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            premium_url: DEFAULT_PREMIUM_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_premium_url(mut self, premium_url: impl Into<String>) -> Self {
        self.premium_url = premium_url.into();
        self
    }

    async fn basic_search(&self, query: &str) -> Result<Value, SearchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SearchError::Config(format!("invalid Jina base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SearchError::Config("Jina base URL cannot take a path".into()))?
            .pop_if_empty()
            .push(query);

        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| transport_error("Jina", e))?;
        check_status("Jina", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Jina response: {e}")))
    }

    async fn premium_search(&self, query: &str, num_results: usize) -> Result<Value, SearchError> {
        let mut request = self
            .client
            .post(&self.premium_url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "q": query, "num": num_results.min(MAX_RESULTS) }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| transport_error("Jina", e))?;
        check_status("Jina", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Jina response: {e}")))
    }
}

#[async_trait]
impl Provider for JinaProvider {
    fn name(&self) -> &str {
        "JinaSearch"
    }

    fn priority(&self) -> f64 {
        1.5
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(60))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(query, "Jina search");

        let data = if num_results > BASIC_MAX_RESULTS {
            self.premium_search(query, num_results).await?
        } else {
            self.basic_search(query).await?
        };

        let results = parse_results(&data, num_results);
        tracing::debug!(count = results.len(), "Jina results parsed");
        Ok(results)
    }
}

/// Accepts a bare array, `{"data": [...]}`, or `{"results": [...]}`.
fn parse_results(data: &Value, num_results: usize) -> Vec<SearchResult> {
    let items = data
        .as_array()
        .or_else(|| data.get("data").and_then(Value::as_array))
        .or_else(|| data.get("results").and_then(Value::as_array));
    let Some(items) = items else {
        return Vec::new();
    };

    let text = |item: &Value, keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str))
            .map(str::to_owned)
    };

    items
        .iter()
        .take(num_results)
        .filter_map(|item| {
            let link = text(item, &["url", "link"]).filter(|u| !u.is_empty())?;
            let title = text(item, &["title"]).unwrap_or_else(|| "No title".to_owned());
            let snippet = text(item, &["description", "snippet"]).unwrap_or_default();
            Some(SearchResult::new(title, link, snippet, "jina"))
        })
        .collect()
}
