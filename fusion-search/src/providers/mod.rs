//! Concrete search providers.
//!
//! Each module provides a struct implementing [`crate::provider::Provider`]
//! for one backend. [`configured_providers`] builds the set described by a
//! [`ProvidersConfig`] in registration order.

pub mod bing;
pub mod duckduckgo;
pub mod exa;
pub mod google;
pub mod jina;
pub mod serper;

pub use bing::BingProvider;
pub use duckduckgo::DuckDuckGoProvider;
pub use exa::ExaProvider;
pub use google::GoogleProvider;
pub use jina::JinaProvider;
pub use serper::SerperProvider;

use crate::config::{HttpConfig, ProvidersConfig};
use crate::error::SearchError;
use crate::http::build_client;
use crate::provider::Provider;
use std::sync::Arc;

/// Build every provider enabled by `config`, sharing one HTTP client.
///
/// Registration order is Google, Serper, Jina, DuckDuckGo, Exa, Bing.
/// Keyed providers are skipped without a key, except Jina which is always
/// registered and simply reports itself unavailable.
///
/// # Errors
///
/// Returns an error if the HTTP configuration is invalid.
pub fn configured_providers(
    config: &ProvidersConfig,
    http: &HttpConfig,
) -> Result<Vec<Arc<dyn Provider>>, SearchError> {
    http.validate()?;
    let client = build_client(http)?;
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    if let (Some(key), Some(cse)) = (
        present(&config.google.api_key),
        present(&config.google.cse_id),
    ) {
        providers.push(Arc::new(GoogleProvider::new(client.clone(), key, cse)));
    }
    if let Some(key) = present(&config.serper_api_key) {
        providers.push(Arc::new(SerperProvider::new(client.clone(), key)));
    }
    providers.push(Arc::new(JinaProvider::new(
        client.clone(),
        present(&config.jina_api_key).map(str::to_owned),
    )));
    if config.duckduckgo_enabled {
        providers.push(Arc::new(DuckDuckGoProvider::new(client.clone())));
    }
    if let Some(key) = present(&config.exa_api_key) {
        providers.push(Arc::new(ExaProvider::new(client.clone(), key)));
    }
    if let Some(key) = present(&config.bing_api_key) {
        providers.push(Arc::new(BingProvider::new(client, key)));
    }

    tracing::info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "search providers configured"
    );
    Ok(providers)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
