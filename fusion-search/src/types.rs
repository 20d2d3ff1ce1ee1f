//! Core types shared by the dispatcher, providers, and page fetcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single search result in the uniform shape every provider produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result page. May be empty.
    pub title: String,
    /// The URL of the result.
    pub link: String,
    /// A text snippet summarising the page, possibly truncated.
    pub snippet: String,
    /// Source tag of the provider that produced this result (e.g. `"serper"`).
    pub source: String,
    /// Provider-specific extras (display link, result kind, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SearchResult {
    /// Build a result without metadata.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            source: source.into(),
            metadata: None,
        }
    }

    /// Attach a single metadata entry, creating the map if needed.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_owned(), value.into());
        self
    }
}

/// Result of one dispatch call.
///
/// An empty `results` list with no `provider` is the normal "exhausted"
/// outcome: every candidate was skipped, failed, or found nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchOutcome {
    /// Results from the single provider that answered.
    pub results: Vec<SearchResult>,
    /// Name of the provider that answered, if any.
    pub provider: Option<String>,
}

impl DispatchOutcome {
    /// True when no provider produced results.
    pub fn is_exhausted(&self) -> bool {
        self.results.is_empty()
    }
}

/// Point-in-time status of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: f64,
    pub available: bool,
    pub in_cooldown: bool,
    pub error_count: u32,
    /// Percentage of successful requests, `0.0` when none were made.
    pub success_rate: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
}

/// Aggregate statistics across all providers of a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchStats {
    pub total_providers: usize,
    pub available_providers: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Percentage of successful requests, `0.0` when none were made.
    pub success_rate: f64,
    pub last_search_time: Option<DateTime<Utc>>,
    pub last_used_provider: Option<String>,
}

/// How page content was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// Pre-rendered markdown from the reader API.
    Reader,
    /// Page content from the scrape API.
    Scrape,
    /// Plain HTTP GET with local markup extraction.
    Direct,
}

impl FetchMethod {
    /// Returns the wire name of this method.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Scrape => "scrape",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format of acquired content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Markdown,
    Text,
}

/// Content handed from the acquirer to the paginator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedContent {
    /// Raw acquired content.
    pub content: String,
    /// Which acquisition method produced it.
    pub method: FetchMethod,
    /// Markdown or plain text.
    pub format: ContentFormat,
    /// Page title, when the method could determine one.
    pub title: Option<String>,
    /// Method-specific metadata (e.g. scrape API page metadata).
    pub metadata: Option<serde_json::Value>,
}
