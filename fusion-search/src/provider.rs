//! Trait definition for pluggable search providers.
//!
//! Each backend (Google, Serper, Jina, DuckDuckGo, Exa, Bing) implements
//! [`Provider`] so the dispatcher can be written purely against the trait.

use crate::error::SearchError;
use crate::types::SearchResult;
use async_trait::async_trait;
use std::time::Duration;

/// A pluggable search backend.
///
/// Implementors handle their own:
///
/// - request construction and credentials
/// - response parsing into uniform [`SearchResult`] values
/// - capping `num_results` at whatever the backend allows
///
/// Transport and parse failures are `Err`; "nothing found" is `Ok(vec![])`.
/// Health bookkeeping is not the provider's concern: the dispatcher owns it.
///
/// Must be `Send + Sync` so a provider can be shared across concurrent
/// dispatches behind an `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable display name, e.g. `"SerperSearch"`. Used for selection by name.
    fn name(&self) -> &str;

    /// Ordering key. Lower values are tried first.
    fn priority(&self) -> f64;

    /// Cooldown override. `None` uses the dispatcher default.
    fn cooldown(&self) -> Option<Duration> {
        None
    }

    /// Static availability gate, e.g. credentials present.
    ///
    /// Independent of health: a provider in cooldown may still report `true`.
    fn is_available(&self) -> bool {
        true
    }

    /// Execute `query`, returning at most `num_results` results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails, the response cannot be
    /// parsed, or the backend is rate limiting.
    async fn search(&self, query: &str, num_results: usize)
        -> Result<Vec<SearchResult>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct StaticProvider {
        results: Vec<SearchResult>,
    }

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &str {
            "StaticSearch"
        }

        fn priority(&self) -> f64 {
            2.0
        }

        async fn search(
            &self,
            _query: &str,
            num_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Ok(self.results.iter().take(num_results).cloned().collect())
        }
    }

    #[test]
    fn provider_is_object_safe_and_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Provider>();
    }

    #[test]
    fn defaults_apply() {
        let provider = StaticProvider { results: vec![] };
        assert!(provider.is_available());
        assert!(provider.cooldown().is_none());
    }

    #[tokio::test]
    async fn search_through_trait_object_respects_limit() {
        let results = (0..5)
            .map(|i| SearchResult::new(format!("T{i}"), format!("https://e{i}.com"), "", "static"))
            .collect();
        let provider: Arc<dyn Provider> = Arc::new(StaticProvider { results });

        let got = provider.search("rust", 3).await.expect("search");
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].title, "T0");
        assert_eq!(provider.name(), "StaticSearch");
    }
}
