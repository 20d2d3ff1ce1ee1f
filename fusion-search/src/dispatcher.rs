//! Priority-ordered provider dispatch with health-aware failover.
//!
//! The dispatcher holds every registered provider sorted by ascending
//! priority, each paired with its own [`HealthTracker`]. A search tries an
//! optional preferred provider first, then walks the whole list in order and
//! returns the first non-empty result set. Providers that are gated off or
//! in cooldown are skipped without being called.

use crate::config::DispatcherConfig;
use crate::error::SearchError;
use crate::health::{success_rate, HealthPolicy, HealthTracker};
use crate::provider::Provider;
use crate::types::{DispatchOutcome, DispatchStats, ProviderStatus, SearchResult};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A registered provider and its health record.
pub struct ProviderEntry {
    provider: Arc<dyn Provider>,
    health: HealthTracker,
}

impl ProviderEntry {
    fn new(provider: Arc<dyn Provider>, config: &DispatcherConfig) -> Self {
        let policy = HealthPolicy {
            cooldown: provider.cooldown().unwrap_or_else(|| config.default_cooldown()),
            max_error_count: config.max_error_count,
        };
        let health = HealthTracker::new(provider.name(), policy);
        Self { provider, health }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn priority(&self) -> f64 {
        self.provider.priority()
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Static gate open and not in cooldown.
    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    pub fn is_available_at(&self, now: Instant) -> bool {
        self.provider.is_available() && self.health.is_available_at(now)
    }

    fn status_at(&self, now: Instant) -> ProviderStatus {
        let snap = self.health.snapshot_at(now);
        ProviderStatus {
            name: self.name().to_owned(),
            priority: self.priority(),
            available: self.provider.is_available() && !snap.in_cooldown,
            in_cooldown: snap.in_cooldown,
            error_count: snap.error_count,
            success_rate: snap.success_rate,
            total_requests: snap.total_requests,
            successful_requests: snap.successful_requests,
            last_success: snap.last_success,
            last_error: snap.last_error,
        }
    }

    fn record_failure(&self, err: &SearchError) {
        let rate_limited = err.is_rate_limit();
        tracing::warn!(
            provider = %self.name(),
            error = %err,
            rate_limited,
            "provider query failed"
        );
        self.health.record_error(rate_limited);
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("health", &self.health)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Activity {
    last_used: Option<String>,
    last_search_time: Option<DateTime<Utc>>,
}

/// Multi-provider search dispatcher.
#[derive(Debug)]
pub struct Dispatcher {
    entries: Vec<ProviderEntry>,
    activity: Mutex<Activity>,
}

impl Dispatcher {
    /// Register `providers` and sort them by ascending priority.
    ///
    /// The sort is stable, so equal priorities keep registration order.
    pub fn new(providers: Vec<Arc<dyn Provider>>, config: &DispatcherConfig) -> Self {
        let mut entries: Vec<ProviderEntry> = providers
            .into_iter()
            .map(|p| ProviderEntry::new(p, config))
            .collect();
        entries.sort_by(|a, b| a.priority().total_cmp(&b.priority()));

        tracing::info!(
            count = entries.len(),
            order = ?entries.iter().map(ProviderEntry::name).collect::<Vec<_>>(),
            "search dispatcher initialised"
        );

        Self {
            entries,
            activity: Mutex::new(Activity::default()),
        }
    }

    /// Providers in dispatch order.
    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a provider by a loose, case-insensitive name.
    ///
    /// Tries an exact match first, then a prefix of the provider name, then
    /// the provider name with its trailing `search` removed, so `"serper"`,
    /// `"Serper"` and `"SerperSearch"` all resolve to `SerperSearch`.
    pub fn find_provider(&self, name: &str) -> Option<&ProviderEntry> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let lowered: Vec<String> = self.entries.iter().map(|e| e.name().to_lowercase()).collect();

        let position = lowered
            .iter()
            .position(|n| *n == wanted)
            .or_else(|| lowered.iter().position(|n| n.starts_with(&wanted)))
            .or_else(|| {
                lowered
                    .iter()
                    .position(|n| n.strip_suffix("search").is_some_and(|s| s == wanted))
            })?;
        self.entries.get(position)
    }

    /// Run `query` against the first provider that produces results.
    ///
    /// `engine` names a preferred provider; `""` or `"auto"` means pure
    /// priority order. A preferred provider that is unavailable, fails, or
    /// returns nothing falls through to priority order.
    ///
    /// # Errors
    ///
    /// Only [`SearchError::NoProviders`] when nothing is registered. Every
    /// provider failure is absorbed; running out of providers yields an
    /// empty [`DispatchOutcome`].
    pub async fn search(
        &self,
        query: &str,
        num_results: usize,
        engine: &str,
    ) -> Result<DispatchOutcome, SearchError> {
        if self.entries.is_empty() {
            return Err(SearchError::NoProviders);
        }
        self.activity().last_search_time = Some(Utc::now());
        tracing::debug!(query, num_results, engine, "dispatching search");

        let engine = engine.trim();
        if !engine.is_empty() && !engine.eq_ignore_ascii_case("auto") {
            match self.find_provider(engine) {
                Some(entry) if entry.is_available() => {
                    tracing::debug!(provider = %entry.name(), "using preferred provider");
                    if let Some(outcome) = self.attempt(entry, query, num_results).await {
                        return Ok(outcome);
                    }
                }
                Some(entry) => {
                    tracing::info!(
                        provider = %entry.name(),
                        "preferred provider unavailable, using priority order"
                    );
                }
                None => {
                    tracing::warn!(engine, "unknown preferred provider, using priority order");
                }
            }
        }

        for entry in &self.entries {
            if !entry.is_available() {
                tracing::trace!(provider = %entry.name(), "skipping unavailable provider");
                continue;
            }
            if let Some(outcome) = self.attempt(entry, query, num_results).await {
                return Ok(outcome);
            }
        }

        tracing::warn!("all search providers exhausted without results");
        Ok(DispatchOutcome::default())
    }

    /// Call one provider and update its health.
    ///
    /// Returns the outcome only for a non-empty result set.
    async fn attempt(
        &self,
        entry: &ProviderEntry,
        query: &str,
        num_results: usize,
    ) -> Option<DispatchOutcome> {
        match entry.provider.search(query, num_results).await {
            Ok(results) if !results.is_empty() => Some(self.succeed(entry, results)),
            Ok(_) => {
                entry.health.record_success();
                tracing::info!(provider = %entry.name(), "provider returned no results");
                None
            }
            Err(err) => {
                entry.record_failure(&err);
                None
            }
        }
    }

    fn succeed(&self, entry: &ProviderEntry, results: Vec<SearchResult>) -> DispatchOutcome {
        entry.health.record_success();
        let name = entry.name().to_owned();
        self.activity().last_used = Some(name.clone());
        tracing::info!(provider = %name, count = results.len(), "search succeeded");
        DispatchOutcome {
            results,
            provider: Some(name),
        }
    }

    /// Status of every provider in dispatch order.
    ///
    /// Each record is read under its own provider's lock, so the list is not
    /// one atomic snapshot across providers.
    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        let now = Instant::now();
        self.entries.iter().map(|e| e.status_at(now)).collect()
    }

    /// Aggregate counters across all providers.
    pub fn stats(&self) -> DispatchStats {
        let statuses = self.provider_statuses();
        let total_requests: u64 = statuses.iter().map(|s| s.total_requests).sum();
        let successful_requests: u64 = statuses.iter().map(|s| s.successful_requests).sum();
        let activity = self.activity();
        DispatchStats {
            total_providers: statuses.len(),
            available_providers: statuses.iter().filter(|s| s.available).count(),
            total_requests,
            successful_requests,
            success_rate: success_rate(successful_requests, total_requests),
            last_search_time: activity.last_search_time,
            last_used_provider: activity.last_used.clone(),
        }
    }

    /// Names of providers that are currently available, in dispatch order.
    pub fn available_provider_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.is_available())
            .map(|e| e.name().to_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Behaviour {
        Results(usize),
        Empty,
        Fail(&'static str),
    }

    struct MockProvider {
        name: &'static str,
        priority: f64,
        gate: bool,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &'static str, priority: f64, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                gate: true,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn gated(name: &'static str, priority: f64) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                gate: false,
                behaviour: Behaviour::Results(1),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> f64 {
            self.priority
        }

        fn cooldown(&self) -> Option<Duration> {
            Some(Duration::from_secs(60))
        }

        fn is_available(&self) -> bool {
            self.gate
        }

        async fn search(
            &self,
            _query: &str,
            num_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Results(n) => Ok((0..n.min(num_results))
                    .map(|i| {
                        SearchResult::new(
                            format!("{} {i}", self.name),
                            format!("https://{}.test/{i}", self.name.to_lowercase()),
                            "",
                            self.name.to_lowercase(),
                        )
                    })
                    .collect()),
                Behaviour::Empty => Ok(vec![]),
                Behaviour::Fail(msg) => Err(SearchError::Http(msg.into())),
            }
        }
    }

    fn dispatcher(providers: Vec<Arc<MockProvider>>) -> Dispatcher {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn Provider>)
            .collect();
        Dispatcher::new(providers, &DispatcherConfig::default())
    }

    #[tokio::test]
    async fn no_providers_is_an_error() {
        let d = Dispatcher::new(vec![], &DispatcherConfig::default());
        let err = d.search("q", 5, "auto").await.unwrap_err();
        assert!(matches!(err, SearchError::NoProviders));
    }

    #[test]
    fn sorted_by_priority_with_stable_ties() {
        let d = dispatcher(vec![
            MockProvider::new("BSearch", 2.0, Behaviour::Empty),
            MockProvider::new("ASearch", 1.0, Behaviour::Empty),
            MockProvider::new("CSearch", 1.0, Behaviour::Empty),
        ]);
        let names: Vec<_> = d.entries().iter().map(ProviderEntry::name).collect();
        assert_eq!(names, ["ASearch", "CSearch", "BSearch"]);
    }

    #[tokio::test]
    async fn first_non_empty_provider_wins() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Empty);
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Results(3));
        let c = MockProvider::new("CSearch", 3.0, Behaviour::Results(3));
        let d = dispatcher(vec![a.clone(), b.clone(), c.clone()]);

        let outcome = d.search("q", 10, "auto").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("BSearch"));
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(c.calls(), 0);
        // Empty counts as a completed request, not an error.
        assert_eq!(d.entries()[0].health().error_count(), 0);
        assert_eq!(d.entries()[0].health().snapshot().successful_requests, 1);
    }

    #[tokio::test]
    async fn failures_are_recorded_and_skipped() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Fail("connection refused"));
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Results(1));
        let d = dispatcher(vec![a, b]);

        let outcome = d.search("q", 5, "").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("BSearch"));
        assert_eq!(d.entries()[0].health().error_count(), 1);
    }

    #[tokio::test]
    async fn repeated_failures_put_provider_in_cooldown() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Fail("HTTP 429"));
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Results(1));
        let d = dispatcher(vec![a.clone(), b]);

        for _ in 0..3 {
            d.search("q", 5, "auto").await.expect("search");
        }
        assert_eq!(a.calls(), 3);
        assert!(d.entries()[0].health().in_cooldown());

        d.search("q", 5, "auto").await.expect("search");
        assert_eq!(a.calls(), 3, "provider in cooldown must not be called");
    }

    #[tokio::test]
    async fn gated_provider_is_never_called() {
        let a = MockProvider::gated("ASearch", 1.0);
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Results(2));
        let d = dispatcher(vec![a.clone(), b]);

        let outcome = d.search("q", 5, "auto").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("BSearch"));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_returns_empty_outcome() {
        let d = dispatcher(vec![
            MockProvider::new("ASearch", 1.0, Behaviour::Fail("boom")),
            MockProvider::new("BSearch", 2.0, Behaviour::Empty),
        ]);
        let outcome = d.search("q", 5, "auto").await.expect("search");
        assert!(outcome.is_exhausted());
        assert!(outcome.provider.is_none());
    }

    #[tokio::test]
    async fn preferred_provider_is_tried_first() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Results(1));
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Results(1));
        let d = dispatcher(vec![a.clone(), b.clone()]);

        let outcome = d.search("q", 5, "b").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("BSearch"));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_preferred_provider_falls_through() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Results(1));
        let b = MockProvider::gated("BSearch", 2.0);
        let d = dispatcher(vec![a, b.clone()]);

        let outcome = d.search("q", 5, "BSearch").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("ASearch"));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn failing_preferred_provider_records_error_and_falls_through() {
        let a = MockProvider::new("ASearch", 1.0, Behaviour::Results(1));
        let b = MockProvider::new("BSearch", 2.0, Behaviour::Fail("bad gateway"));
        let d = dispatcher(vec![a, b.clone()]);

        let outcome = d.search("q", 5, "bsearch").await.expect("search");
        assert_eq!(outcome.provider.as_deref(), Some("ASearch"));
        assert_eq!(b.calls(), 1);
        assert_eq!(d.entries()[1].health().error_count(), 1);
    }

    #[test]
    fn find_provider_loose_matching() {
        let d = dispatcher(vec![
            MockProvider::new("SerperSearch", 1.0, Behaviour::Empty),
            MockProvider::new("DuckDuckGoSearch", 2.0, Behaviour::Empty),
        ]);
        let found = |n: &str| d.find_provider(n).map(ProviderEntry::name);
        assert_eq!(found("SerperSearch"), Some("SerperSearch"));
        assert_eq!(found("serper"), Some("SerperSearch"));
        assert_eq!(found("DUCK"), Some("DuckDuckGoSearch"));
        assert_eq!(found("duckduckgo"), Some("DuckDuckGoSearch"));
        assert_eq!(found("bing"), None);
        assert_eq!(found(""), None);
    }

    #[tokio::test]
    async fn stats_aggregate_and_track_last_used() {
        let d = dispatcher(vec![
            MockProvider::new("ASearch", 1.0, Behaviour::Fail("boom")),
            MockProvider::new("BSearch", 2.0, Behaviour::Results(1)),
        ]);
        let before = d.stats();
        assert_eq!(before.total_requests, 0);
        assert!(before.success_rate.abs() < f64::EPSILON);
        assert!(before.last_search_time.is_none());

        d.search("q", 5, "auto").await.expect("search");
        let stats = d.stats();
        assert_eq!(stats.total_providers, 2);
        assert_eq!(stats.available_providers, 2);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.successful_requests, 1);
        assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
        assert!(stats.last_search_time.is_some());
        assert_eq!(stats.last_used_provider.as_deref(), Some("BSearch"));
    }

    #[tokio::test]
    async fn statuses_are_idempotent() {
        let d = dispatcher(vec![MockProvider::new("ASearch", 1.0, Behaviour::Results(1))]);
        d.search("q", 5, "auto").await.expect("search");
        assert_eq!(d.provider_statuses(), d.provider_statuses());
        assert_eq!(d.available_provider_names(), ["ASearch"]);
    }
}
