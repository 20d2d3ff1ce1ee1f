//! Serper Google search API.
//!
//! Besides organic results, a knowledge-graph entry is placed first and up
//! to two "people also ask" entries are appended.

use crate::error::SearchError;
use crate::http::{check_status, transport_error};
use crate::provider::Provider;
use crate::types::SearchResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev/search";
const MAX_RESULTS: usize = 100;
const PEOPLE_ALSO_ASK_LIMIT: usize = 2;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SerperResponse {
    knowledge_graph: Option<KnowledgeGraph>,
    organic: Vec<OrganicItem>,
    people_also_ask: Vec<QuestionItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KnowledgeGraph {
    title: String,
    description: String,
    website: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganicItem {
    title: String,
    link: String,
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuestionItem {
    question: String,
    snippet: String,
    link: String,
}

/// Serper API provider.
#[derive(Debug, Clone)]
pub struct SerperProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerperProvider {
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
impl Provider for SerperProvider {
    fn name(&self) -> &str {
        "SerperSearch"
    }

    fn priority(&self) -> f64 {
        1.0
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(60))
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query, "Serper search");

        let payload = serde_json::json!({
            "q": query,
            "num": num_results.clamp(1, MAX_RESULTS),
            "autocorrect": false,
            "gl": "us",
            "hl": "en",
        });
        let response = self
            .client
            .post(&self.base_url)
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("Serper", e))?;

        let data: SerperResponse = check_status("Serper", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Serper response: {e}")))?;

        let results = collect_results(data, num_results);
        tracing::debug!(count = results.len(), "Serper results parsed");
        Ok(results)
    }
}

fn collect_results(data: SerperResponse, num_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(kg) = data.knowledge_graph.filter(|kg| !kg.title.is_empty()) {
        let snippet = if kg.description.is_empty() {
            format!("Information about {}", kg.title)
        } else {
            kg.description
        };
        results.push(
            SearchResult::new(format!("Knowledge Graph: {}", kg.title), kg.website, snippet, "serper")
                .with_metadata("kind", "knowledge_graph"),
        );
    }

    results.extend(
        data.organic
            .into_iter()
            .filter(|item| !item.title.is_empty() && !item.link.is_empty())
            .map(|item| SearchResult::new(item.title, item.link, item.snippet, "serper")),
    );

    results.extend(
        data.people_also_ask
            .into_iter()
            .take(PEOPLE_ALSO_ASK_LIMIT)
            .filter(|item| !item.question.is_empty())
            .map(|item| {
                let snippet = if item.snippet.is_empty() {
                    "Click to see detailed answer".to_owned()
                } else {
                    item.snippet
                };
                SearchResult::new(item.question, item.link, snippet, "serper")
                    .with_metadata("kind", "people_also_ask")
            }),
    );

    results.truncate(num_results);
    results
}
