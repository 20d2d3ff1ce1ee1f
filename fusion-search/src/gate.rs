//! Concurrency gate with lazy, retry-limited construction.
//!
//! [`SearchGate`] wraps an expensive shared value (normally the
//! [`Dispatcher`](crate::Dispatcher)) that is built on first use. Construction
//! happens at most once at a time behind an async mutex, with a lock-free fast
//! path once the value is ready. A failed attempt starts a retry cooldown
//! during which callers get [`SearchError::Initializing`] immediately instead
//! of queueing behind another doomed attempt.
//!
//! Every operation run through the gate holds one semaphore permit and is
//! bounded by an overall timeout. Timed-out operations keep running in their
//! own task, so whatever they record (provider health, for example) still
//! lands.

use crate::config::GateConfig;
use crate::error::SearchError;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

/// Boxed async constructor for the gated value.
pub type Builder<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, SearchError>> + Send + Sync>;

#[derive(Debug)]
enum InitState {
    Uninitialized,
    CoolingDown { failed_at: Instant, reason: String },
    Ready,
}

/// Construction state of a gate, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Uninitialized,
    CoolingDown,
    Ready,
}

/// Point-in-time view of a gate for status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub state: GateState,
    /// Error from the last failed construction, while cooling down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub available_permits: usize,
    pub max_concurrent: usize,
}

/// Lazily constructed, concurrency-limited shared value.
pub struct SearchGate<T> {
    builder: Builder<T>,
    ready: OnceLock<Arc<T>>,
    init: Mutex<InitState>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    retry_cooldown: Duration,
    operation_timeout: Duration,
}

impl<T> SearchGate<T>
where
    T: Send + Sync + 'static,
{
    /// Create a gate that builds its value with `builder` on first use.
    pub fn new<F, Fut>(config: &GateConfig, builder: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SearchError>> + Send + 'static,
    {
        Self {
            builder: Box::new(move || builder().boxed()),
            ready: OnceLock::new(),
            init: Mutex::new(InitState::Uninitialized),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            max_concurrent: config.max_concurrent,
            retry_cooldown: Duration::from_secs(config.init_retry_cooldown_secs),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
        }
    }

    /// Override the construction retry cooldown.
    #[must_use]
    pub fn with_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.retry_cooldown = cooldown;
        self
    }

    /// Override the per-operation timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Return the shared value, constructing it if needed.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Initializing`] while a previous failure's retry
    ///   cooldown is running. Does not block.
    /// - [`SearchError::Unavailable`] when this call's construction attempt
    ///   failed.
    pub async fn get(&self) -> Result<Arc<T>, SearchError> {
        if let Some(value) = self.ready.get() {
            return Ok(Arc::clone(value));
        }

        let mut state = self.init.lock().await;
        // Another caller may have finished construction while we waited.
        if let Some(value) = self.ready.get() {
            return Ok(Arc::clone(value));
        }

        if let InitState::CoolingDown { failed_at, .. } = &*state {
            let elapsed = failed_at.elapsed();
            if elapsed < self.retry_cooldown {
                return Err(SearchError::Initializing {
                    retry_after_secs: ceil_secs(self.retry_cooldown - elapsed),
                });
            }
        }

        tracing::info!("constructing search dispatcher");
        match (self.builder)().await {
            Ok(value) => {
                let value = Arc::new(value);
                let stored = Arc::clone(self.ready.get_or_init(|| value));
                *state = InitState::Ready;
                tracing::info!("search dispatcher ready");
                Ok(stored)
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::error!(
                    error = %reason,
                    retry_in_secs = self.retry_cooldown.as_secs(),
                    "search dispatcher construction failed"
                );
                *state = InitState::CoolingDown {
                    failed_at: Instant::now(),
                    reason: reason.clone(),
                };
                Err(SearchError::Unavailable(reason))
            }
        }
    }

    /// Run `op` against the shared value under a permit and the timeout.
    ///
    /// Waits for a permit when the gate is saturated. The operation runs in
    /// its own task which keeps the permit until it finishes, even if the
    /// caller has already given up.
    ///
    /// # Errors
    ///
    /// Anything [`get`](Self::get) returns, [`SearchError::Timeout`] when the
    /// operation overruns, or the operation's own error.
    pub async fn run<F, Fut, R>(&self, op: F) -> Result<R, SearchError>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R, SearchError>> + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SearchError::Unavailable("concurrency gate closed".into()))?;
        let target = self.get().await?;

        let fut = op(target);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            fut.await
        });

        match tokio::time::timeout(self.operation_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SearchError::Unavailable(format!(
                "search task aborted: {join_err}"
            ))),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.operation_timeout.as_secs_f64(),
                    "gated operation timed out"
                );
                Err(SearchError::Timeout(format!(
                    "exceeded {}s",
                    self.operation_timeout.as_secs_f64()
                )))
            }
        }
    }

    /// The value, if construction already succeeded.
    pub fn ready(&self) -> Option<Arc<T>> {
        self.ready.get().cloned()
    }

    /// Current construction state.
    pub async fn state(&self) -> GateState {
        self.status().await.state
    }

    /// State, last failure, and permit usage.
    pub async fn status(&self) -> GateStatus {
        let (state, last_error, retry_after_secs) = match &*self.init.lock().await {
            InitState::Uninitialized => (GateState::Uninitialized, None, None),
            InitState::Ready => (GateState::Ready, None, None),
            InitState::CoolingDown { failed_at, reason } => {
                let remaining = self.retry_cooldown.saturating_sub(failed_at.elapsed());
                (
                    GateState::CoolingDown,
                    Some(reason.clone()),
                    Some(ceil_secs(remaining)),
                )
            }
        };
        GateStatus {
            state,
            last_error,
            retry_after_secs,
            available_permits: self.available_permits(),
            max_concurrent: self.max_concurrent,
        }
    }

    /// Free slots for new operations.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl<T> std::fmt::Debug for SearchGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGate")
            .field("ready", &self.ready.get().is_some())
            .field("available_permits", &self.permits.available_permits())
            .field("max_concurrent", &self.max_concurrent)
            .field("retry_cooldown", &self.retry_cooldown)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
