//! Per-provider health tracking with a cooldown circuit breaker.
//!
//! Each provider owns one [`HealthTracker`]. Errors accumulate until the
//! configured maximum is reached, at which point the provider is in
//! cooldown until the cooldown window since the last error has passed.
//! Any success resets the error count and ends the cooldown immediately.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────┐  max_error_count errors  ┌──────────┐
//! │ Available ├─────────────────────────►│ Cooldown │
//! └─────▲─────┘                          └────┬─────┘
//!       │   success, or cooldown elapsed      │
//!       └─────────────────────────────────────┘
//! ```
//!
//! All state lives behind one [`Mutex`] per tracker so unrelated providers
//! never serialise each other. Callers only see [`HealthSnapshot`] copies.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Cooldown applied when a provider does not choose its own.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Errors tolerated before a provider enters cooldown.
pub const DEFAULT_MAX_ERROR_COUNT: u32 = 3;

/// Thresholds for one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// How long a tripped provider stays unavailable after its last error.
    pub cooldown: Duration,
    /// Error count at which the provider trips.
    pub max_error_count: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            max_error_count: DEFAULT_MAX_ERROR_COUNT,
        }
    }
}

#[derive(Debug, Default)]
struct HealthState {
    error_count: u32,
    last_error_at: Option<Instant>,
    last_success_at: Option<Instant>,
    last_error_wall: Option<DateTime<Utc>>,
    last_success_wall: Option<DateTime<Utc>>,
    total_requests: u64,
    successful_requests: u64,
}

impl HealthState {
    fn in_cooldown(&self, policy: &HealthPolicy, now: Instant) -> bool {
        if self.error_count < policy.max_error_count {
            return false;
        }
        self.last_error_at
            .is_some_and(|t| now.saturating_duration_since(t) < policy.cooldown)
    }
}

/// Copy of a tracker's counters taken under its lock.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub error_count: u32,
    pub in_cooldown: bool,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub success_rate: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
}

/// Mutable health record for a single provider.
#[derive(Debug)]
pub struct HealthTracker {
    name: String,
    policy: HealthPolicy,
    state: Mutex<HealthState>,
}

impl HealthTracker {
    /// Create a tracker for the provider called `name`.
    pub fn new(name: impl Into<String>, policy: HealthPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn policy(&self) -> HealthPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful request.
    ///
    /// Resets the error count to zero regardless of previous state, which
    /// ends any active cooldown immediately.
    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    /// [`record_success`](Self::record_success) with an explicit clock reading.
    pub fn record_success_at(&self, now: Instant) {
        let mut state = self.lock();
        state.last_success_at = Some(now);
        state.last_success_wall = Some(Utc::now());
        state.successful_requests += 1;
        state.total_requests += 1;
        if state.error_count > 0 {
            tracing::info!(
                provider = %self.name,
                errors = state.error_count,
                "provider recovered from errors"
            );
            state.error_count = 0;
        }
    }

    /// Record a failed request.
    ///
    /// `is_rate_limit` only affects logging; the cooldown is the same
    /// either way.
    pub fn record_error(&self, is_rate_limit: bool) {
        self.record_error_at(is_rate_limit, Instant::now());
    }

    /// [`record_error`](Self::record_error) with an explicit clock reading.
    pub fn record_error_at(&self, is_rate_limit: bool, now: Instant) {
        let mut state = self.lock();
        state.error_count += 1;
        state.last_error_at = Some(now);
        state.last_error_wall = Some(Utc::now());
        state.total_requests += 1;

        if is_rate_limit {
            tracing::warn!(
                provider = %self.name,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "provider hit rate limit"
            );
        } else if state.error_count >= self.policy.max_error_count {
            tracing::error!(
                provider = %self.name,
                errors = state.error_count,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "provider disabled due to excessive errors"
            );
        }
    }

    /// True while the provider has tripped and its cooldown has not elapsed.
    pub fn in_cooldown(&self) -> bool {
        self.in_cooldown_at(Instant::now())
    }

    pub fn in_cooldown_at(&self, now: Instant) -> bool {
        self.lock().in_cooldown(&self.policy, now)
    }

    /// Negation of [`in_cooldown`](Self::in_cooldown).
    pub fn is_available(&self) -> bool {
        !self.in_cooldown()
    }

    pub fn is_available_at(&self, now: Instant) -> bool {
        !self.in_cooldown_at(now)
    }

    /// Successful requests as a percentage of all requests.
    pub fn success_rate(&self) -> f64 {
        let state = self.lock();
        success_rate(state.successful_requests, state.total_requests)
    }

    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    /// Read every counter under a single lock acquisition.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> HealthSnapshot {
        let state = self.lock();
        HealthSnapshot {
            error_count: state.error_count,
            in_cooldown: state.in_cooldown(&self.policy, now),
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            success_rate: success_rate(state.successful_requests, state.total_requests),
            last_success: state.last_success_wall,
            last_error: state.last_error_wall,
        }
    }
}

/// `successful / total * 100`, defined as `0.0` when `total == 0`.
pub(crate) fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    successful as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tracker(max_error_count: u32, cooldown_secs: u64) -> HealthTracker {
        HealthTracker::new(
            "TestSearch",
            HealthPolicy {
                cooldown: Duration::from_secs(cooldown_secs),
                max_error_count,
            },
        )
    }

    #[test]
    fn initial_state_is_available() {
        let tracker = make_tracker(3, 300);
        assert!(tracker.is_available());
        assert!(!tracker.in_cooldown());
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn stays_available_below_threshold() {
        let tracker = make_tracker(3, 300);
        let now = Instant::now();
        tracker.record_error_at(false, now);
        tracker.record_error_at(false, now);
        assert!(tracker.is_available_at(now));
        assert_eq!(tracker.error_count(), 2);
    }

    #[test]
    fn trips_at_threshold() {
        let tracker = make_tracker(3, 300);
        let now = Instant::now();
        for _ in 0..3 {
            tracker.record_error_at(false, now);
        }
        assert!(tracker.in_cooldown_at(now));
        assert!(!tracker.is_available_at(now));
    }

    #[test]
    fn cooldown_ends_after_duration() {
        let tracker = make_tracker(3, 300);
        let now = Instant::now();
        for _ in 0..3 {
            tracker.record_error_at(false, now);
        }
        assert!(!tracker.is_available_at(now + Duration::from_secs(299)));
        assert!(tracker.is_available_at(now + Duration::from_secs(300)));
        // Error count is not cleared by the cooldown expiring.
        assert_eq!(tracker.error_count(), 3);
    }

    #[test]
    fn cooldown_measured_from_last_error() {
        let tracker = make_tracker(3, 60);
        let start = Instant::now();
        for _ in 0..3 {
            tracker.record_error_at(false, start);
        }
        let later = start + Duration::from_secs(61);
        assert!(tracker.is_available_at(later));

        // A fourth error after the window re-trips immediately.
        tracker.record_error_at(false, later);
        assert!(tracker.in_cooldown_at(later));
        assert!(tracker.is_available_at(later + Duration::from_secs(60)));
    }

    #[test]
    fn success_ends_cooldown_immediately() {
        let tracker = make_tracker(3, 300);
        let now = Instant::now();
        for _ in 0..3 {
            tracker.record_error_at(false, now);
        }
        assert!(tracker.in_cooldown_at(now));
        tracker.record_success_at(now);
        assert!(tracker.is_available_at(now));
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn rate_limit_flag_does_not_change_cooldown() {
        let limited = make_tracker(2, 300);
        let plain = make_tracker(2, 300);
        let now = Instant::now();
        for _ in 0..2 {
            limited.record_error_at(true, now);
            plain.record_error_at(false, now);
        }
        let later = now + Duration::from_secs(150);
        assert_eq!(limited.in_cooldown_at(later), plain.in_cooldown_at(later));
        assert!(limited.in_cooldown_at(later));
    }

    #[test]
    fn success_rate_zero_without_requests() {
        let tracker = make_tracker(3, 300);
        assert!(tracker.success_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn success_rate_counts_both_outcomes() {
        let tracker = make_tracker(10, 300);
        tracker.record_success();
        tracker.record_success();
        tracker.record_success();
        tracker.record_error(false);
        assert!((tracker.success_rate() - 75.0).abs() < f64::EPSILON);

        let snap = tracker.snapshot();
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.successful_requests, 3);
        assert!(snap.last_success.is_some());
        assert!(snap.last_error.is_some());
    }

    #[test]
    fn rapid_success_failure_alternation_never_trips() {
        let tracker = make_tracker(3, 300);
        for _ in 0..10 {
            tracker.record_error(false);
            tracker.record_success();
        }
        assert!(tracker.is_available());
    }

    #[test]
    fn snapshot_is_stable_without_activity() {
        let tracker = make_tracker(3, 300);
        tracker.record_error(true);
        let now = Instant::now();
        assert_eq!(tracker.snapshot_at(now), tracker.snapshot_at(now));
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        use std::sync::Arc;

        let tracker = Arc::new(make_tracker(u32::MAX, 300));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            t.record_success();
                        } else {
                            t.record_error(false);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.total_requests, 800);
        assert_eq!(snap.successful_requests, 400);
    }

    #[test]
    fn default_policy_values() {
        let policy = HealthPolicy::default();
        assert_eq!(policy.cooldown, Duration::from_secs(300));
        assert_eq!(policy.max_error_count, 3);
    }
}
