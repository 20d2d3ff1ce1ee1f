//! Request shell around the search gate and the web fetcher.
//!
//! Every operation returns a serializable envelope. Failures never escape
//! as errors: they become an [`ErrorEnvelope`] carrying a kind, a message,
//! and a suggestion for the caller.

use crate::config::FusionConfig;
use crate::error::Result;
use crate::protocol::{Request, Response, SearchArgs, Tool};
use chrono::{DateTime, Utc};
use fusion_search::{
    DispatchStats, Dispatcher, FetchRequest, FetchResponse, GateStatus, ProviderStatus,
    SearchError, SearchGate, SearchResult, WebFetcher,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const NO_RESULTS_MESSAGE: &str = "No results found, try different keywords or search engines";
const RETRY_SUGGESTION: &str = "Please try again later, or try using other search engines";

/// Outcome of a shell operation.
pub type Reply<T> = std::result::Result<T, ErrorEnvelope>;

/// Successful search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEnvelope {
    pub query: String,
    pub engine: String,
    /// Provider that answered; absent when every provider came up empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub time_ms: u64,
    pub num_results: usize,
    pub results: Vec<SearchResult>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Successful fetch: the fetcher's response plus timing.
#[derive(Debug, Clone, Serialize)]
pub struct FetchEnvelope {
    #[serde(flatten)]
    pub response: FetchResponse,
    pub time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Provider and gate status.
#[derive(Debug, Clone, Serialize)]
pub struct EnginesEnvelope {
    /// Providers currently able to take requests, in dispatch order.
    pub engines: Vec<String>,
    pub providers: Vec<ProviderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DispatchStats>,
    pub gate: GateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of clearing the page cache.
#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheEnvelope {
    pub cleared: usize,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// Any failed operation.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Stable machine-readable category, e.g. `timeout` or `invalid_page`.
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub suggestion: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl ErrorEnvelope {
    /// Envelope for a library error.
    #[must_use]
    pub fn from_error(err: &SearchError) -> Self {
        let retry_after_secs = match err {
            SearchError::Initializing { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self {
            kind: error_kind(err),
            error: err.to_string(),
            query: None,
            engine: None,
            url: None,
            retry_after_secs,
            suggestion: suggestion_for(err),
            timestamp: Utc::now(),
            success: false,
        }
    }

    fn unknown_tool(tool: &str) -> Self {
        let known: Vec<&str> = Tool::ALL.iter().map(|t| t.as_str()).collect();
        Self {
            kind: "unknown_tool",
            error: format!("unknown tool '{tool}'"),
            query: None,
            engine: None,
            url: None,
            retry_after_secs: None,
            suggestion: format!("Use one of: {}", known.join(", ")),
            timestamp: Utc::now(),
            success: false,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: &str, engine: &str) -> Self {
        self.query = Some(query.to_owned());
        self.engine = Some(engine.to_owned());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_owned());
        self
    }
}

fn error_kind(err: &SearchError) -> &'static str {
    match err {
        SearchError::NoProviders => "no_providers",
        SearchError::Http(_) => "http",
        SearchError::Parse(_) => "parse",
        SearchError::RateLimited(_) => "rate_limited",
        SearchError::Config(_) => "config",
        SearchError::Timeout(_) => "timeout",
        SearchError::Initializing { .. } => "initializing",
        SearchError::Unavailable(_) => "unavailable",
        SearchError::AllMethodsFailed(_) => "all_methods_failed",
        SearchError::PageNotCached(_) => "page_not_cached",
        SearchError::InvalidPage { .. } => "invalid_page",
        SearchError::InvalidRequest(_) => "invalid_request",
    }
}

fn suggestion_for(err: &SearchError) -> String {
    match err {
        SearchError::Initializing { retry_after_secs } => {
            format!("Search is starting up, retry in {retry_after_secs}s")
        }
        SearchError::PageNotCached(_) => {
            "Fetch page 1 of this URL first, then request later pages".into()
        }
        SearchError::InvalidPage { total, .. } => {
            format!("Request a page_number between 1 and {total}")
        }
        SearchError::AllMethodsFailed(_) => {
            "Check that the URL is reachable, or try again later".into()
        }
        SearchError::InvalidRequest(_) | SearchError::Config(_) => {
            "Check the request arguments and try again".into()
        }
        _ => RETRY_SUGGESTION.into(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize envelope");
        serde_json::json!({ "success": false, "error": format!("serialization failed: {e}") })
    })
}

fn reply_value<T: Serialize>(reply: &Reply<T>) -> Value {
    match reply {
        Ok(envelope) => to_value(envelope),
        Err(envelope) => to_value(envelope),
    }
}

/// The search and fetch service behind the stdio bridge.
#[derive(Debug)]
pub struct SearchFusionServer {
    gate: SearchGate<Dispatcher>,
    fetcher: WebFetcher,
    fetch_permits: Arc<Semaphore>,
    fetch_timeout: Duration,
    default_num_results: usize,
}

impl SearchFusionServer {
    /// Build the server; the dispatcher itself is built on first search.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &FusionConfig) -> Result<Self> {
        let providers = config.providers.clone();
        let dispatcher = config.dispatcher.clone();
        let http = config.http.clone();
        Self::with_builder(config, move || {
            let (providers, dispatcher, http) = (providers.clone(), dispatcher.clone(), http.clone());
            async move { fusion_search::build_dispatcher(&providers, &dispatcher, &http) }
        })
    }

    /// Build the server with a custom dispatcher constructor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_builder<F, Fut>(config: &FusionConfig, builder: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = fusion_search::Result<Dispatcher>> + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            gate: SearchGate::new(&config.gate, builder),
            fetcher: WebFetcher::new(&config.fetch, &config.http)?,
            fetch_permits: Arc::new(Semaphore::new(config.server.max_concurrent_fetches)),
            fetch_timeout: config.server.fetch_timeout(),
            default_num_results: config.server.default_num_results,
        })
    }

    /// Override the outer fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Search through the gate.
    ///
    /// `num_results` of `None` uses the configured default; an empty
    /// `engine` means `auto`.
    pub async fn search(
        &self,
        query: &str,
        num_results: Option<usize>,
        engine: &str,
    ) -> Reply<SearchEnvelope> {
        let started = Instant::now();
        let engine = match engine.trim() {
            "" => "auto",
            e => e,
        };
        if query.trim().is_empty() {
            let err = SearchError::InvalidRequest("query must not be empty".into());
            return Err(ErrorEnvelope::from_error(&err).with_query(query, engine));
        }
        let num_results = num_results.unwrap_or(self.default_num_results).max(1);
        tracing::info!(engine, num_results, "starting search");

        let (q, e) = (query.to_owned(), engine.to_owned());
        let outcome = self
            .gate
            .run(move |dispatcher| async move { dispatcher.search(&q, num_results, &e).await })
            .await;

        let time_ms = elapsed_ms(started);
        match outcome {
            Ok(outcome) => {
                let message = if outcome.results.is_empty() {
                    tracing::warn!(time_ms, "search returned no results");
                    Some(NO_RESULTS_MESSAGE.to_owned())
                } else {
                    tracing::info!(count = outcome.results.len(), time_ms, "search successful");
                    None
                };
                Ok(SearchEnvelope {
                    query: query.to_owned(),
                    engine: engine.to_owned(),
                    provider: outcome.provider,
                    time_ms,
                    num_results: outcome.results.len(),
                    results: outcome.results,
                    timestamp: Utc::now(),
                    success: true,
                    message,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, time_ms, "search failed");
                Err(ErrorEnvelope::from_error(&err).with_query(query, engine))
            }
        }
    }

    /// Fetch one page of a URL under the outer fetch timeout.
    ///
    /// At most `max_concurrent_fetches` fetches run at once. Time spent
    /// waiting for a slot counts against the timeout.
    pub async fn fetch_url(&self, request: &FetchRequest) -> Reply<FetchEnvelope> {
        let started = Instant::now();
        tracing::info!(url = %request.url, page = request.page_number, "starting web fetch");

        let bounded = async {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|_| SearchError::Unavailable("fetch limiter closed".into()))?;
            self.fetcher.fetch_url(request).await
        };
        let result = match tokio::time::timeout(self.fetch_timeout, bounded).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!(
                "web fetch exceeded {}s",
                self.fetch_timeout.as_secs_f64()
            ))),
        };

        let time_ms = elapsed_ms(started);
        match result {
            Ok(response) => {
                tracing::info!(
                    url = %request.url,
                    page_info = %response.page_info,
                    time_ms,
                    "web fetch successful"
                );
                Ok(FetchEnvelope {
                    response,
                    time_ms,
                    timestamp: Utc::now(),
                })
            }
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, time_ms, "web fetch failed");
                Err(ErrorEnvelope::from_error(&err).with_url(&request.url))
            }
        }
    }

    /// Provider availability, statistics, and gate state.
    ///
    /// Builds the dispatcher if needed. A construction failure is reported
    /// in `error` with an empty engine list.
    pub async fn available_engines(&self) -> EnginesEnvelope {
        let (engines, providers, stats, error) = match self.gate.get().await {
            Ok(dispatcher) => (
                dispatcher.available_provider_names(),
                dispatcher.provider_statuses(),
                Some(dispatcher.stats()),
                None,
            ),
            Err(err) => {
                tracing::warn!(error = %err, "engine status requested while dispatcher unavailable");
                (Vec::new(), Vec::new(), None, Some(err.to_string()))
            }
        };
        tracing::info!(engines = engines.len(), "engine status retrieved");
        EnginesEnvelope {
            engines,
            providers,
            stats,
            gate: self.gate.status().await,
            error,
            timestamp: Utc::now(),
        }
    }

    /// Fetch slots currently free.
    pub fn available_fetch_permits(&self) -> usize {
        self.fetch_permits.available_permits()
    }

    /// Drop every cached page set.
    pub fn clear_page_cache(&self) -> ClearCacheEnvelope {
        ClearCacheEnvelope {
            cleared: self.fetcher.clear_cache(),
            timestamp: Utc::now(),
            success: true,
        }
    }

    /// Route one protocol request to its operation.
    pub async fn handle(&self, request: Request) -> Response {
        let Request { id, tool, args } = request;
        let result = match Tool::parse(&tool) {
            Some(Tool::Search) => match serde_json::from_value::<SearchArgs>(args) {
                Ok(args) => reply_value(&self.search(&args.query, args.num_results, &args.engine).await),
                Err(e) => invalid_args(&tool, &e),
            },
            Some(Tool::FetchUrl) => match serde_json::from_value::<FetchRequest>(args) {
                Ok(request) => reply_value(&self.fetch_url(&request).await),
                Err(e) => invalid_args(&tool, &e),
            },
            Some(Tool::GetAvailableEngines) => to_value(&self.available_engines().await),
            Some(Tool::ClearCache) => to_value(&self.clear_page_cache()),
            Some(Tool::Shutdown) => serde_json::json!({
                "success": true,
                "message": "shutting down",
            }),
            None => {
                tracing::warn!(%tool, "unknown tool requested");
                to_value(&ErrorEnvelope::unknown_tool(&tool))
            }
        };
        Response { id, tool, result }
    }
}

fn invalid_args(tool: &str, err: &serde_json::Error) -> Value {
    let err = SearchError::InvalidRequest(format!("invalid arguments for {tool}: {err}"));
    to_value(&ErrorEnvelope::from_error(&err))
}
