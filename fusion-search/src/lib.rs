//! # fusion-search
//!
//! Multi-provider web search with failover, plus paginated page fetching.
//!
//! ## Design
//!
//! - Providers (Google, Serper, Jina, DuckDuckGo, Exa, Bing) implement one
//!   [`Provider`] trait and are tried in ascending priority order
//! - Each provider carries its own health record; repeated failures put it in
//!   a cooldown during which the [`Dispatcher`] skips it
//! - A [`SearchGate`] bounds concurrent searches, builds the dispatcher lazily
//!   on first use, and times out slow operations
//! - [`WebFetcher`] retrieves a page through a reader service, a scrape
//!   service, or a direct request, and splits long content into cached pages
//!
//! ## Security
//!
//! - API keys are only sent to the provider they belong to
//! - Search queries are logged only at trace level
//! - Only `http` and `https` URLs are fetched

pub mod acquirer;
pub mod config;
pub mod content;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod health;
pub mod http;
pub mod paginate;
pub mod provider;
pub mod providers;
pub mod types;

pub use acquirer::ContentAcquirer;
pub use config::{
    DispatcherConfig, FetchConfig, GateConfig, GoogleCredentials, HttpConfig, ProvidersConfig,
};
pub use dispatcher::{Dispatcher, ProviderEntry};
pub use error::{Result, SearchError};
pub use fetcher::{FetchRequest, FetchResponse, WebFetcher};
pub use gate::{GateState, GateStatus, SearchGate};
pub use health::{HealthPolicy, HealthSnapshot, HealthTracker};
pub use paginate::PageCache;
pub use provider::Provider;
pub use providers::configured_providers;
pub use types::{
    ContentFormat, DispatchOutcome, DispatchStats, FetchMethod, FetchedContent, ProviderStatus,
    SearchResult,
};

/// Build a [`Dispatcher`] over every provider enabled by `providers`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if any configuration is invalid, or
/// [`SearchError::NoProviders`] if nothing could be registered.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> fusion_search::Result<()> {
/// let dispatcher = fusion_search::build_dispatcher(
///     &fusion_search::ProvidersConfig::default(),
///     &fusion_search::DispatcherConfig::default(),
///     &fusion_search::HttpConfig::default(),
/// )?;
/// let outcome = dispatcher.search("rust programming", 5, "auto").await?;
/// for result in &outcome.results {
///     println!("{}: {}", result.title, result.link);
/// }
/// # Ok(())
/// # }
/// ```
pub fn build_dispatcher(
    providers: &ProvidersConfig,
    dispatcher: &DispatcherConfig,
    http: &HttpConfig,
) -> Result<Dispatcher> {
    dispatcher.validate()?;
    let registered = configured_providers(providers, http)?;
    if registered.is_empty() {
        return Err(SearchError::NoProviders);
    }
    Ok(Dispatcher::new(registered, dispatcher))
}
