//! Configuration for providers, dispatch, the concurrency gate, and fetching.
//!
//! Every struct has sensible defaults and a `validate()` method. All of them
//! are serde types so the host application can embed them in its own config
//! file.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shared HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Proxy URL applied to every request (`http://`, `https://`, `socks5://`).
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: None,
            proxy: None,
        }
    }
}

impl HttpConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Google Custom Search credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleCredentials {
    pub api_key: Option<String>,
    pub cse_id: Option<String>,
}

/// Which providers to register and with what credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google: GoogleCredentials,
    pub serper_api_key: Option<String>,
    pub jina_api_key: Option<String>,
    pub exa_api_key: Option<String>,
    pub bing_api_key: Option<String>,
    /// DuckDuckGo needs no key; this switch removes it from the chain.
    pub duckduckgo_enabled: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google: GoogleCredentials::default(),
            serper_api_key: None,
            jina_api_key: None,
            exa_api_key: None,
            bing_api_key: None,
            duckduckgo_enabled: true,
        }
    }
}

/// Health policy defaults applied by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Cooldown for providers that do not override it, in seconds.
    pub default_cooldown_secs: u64,
    /// Consecutive errors before a provider enters cooldown.
    pub max_error_count: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 300,
            max_error_count: 3,
        }
    }
}

impl DispatcherConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_error_count == 0 {
            return Err(SearchError::Config(
                "max_error_count must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }
}

/// Concurrency gate and lazy-construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum simultaneous search operations.
    pub max_concurrent: usize,
    /// Seconds to wait after a failed construction before trying again.
    pub init_retry_cooldown_secs: u64,
    /// Overall timeout for one search operation, in seconds.
    pub operation_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 30,
            init_retry_cooldown_secs: 30,
            operation_timeout_secs: 60,
        }
    }
}

impl GateConfig {
    /// Validates this configuration.
    ///
    /// Checks:
    /// - `max_concurrent` must be greater than 0
    /// - `operation_timeout_secs` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_concurrent == 0 {
            return Err(SearchError::Config(
                "max_concurrent must be greater than 0".into(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(SearchError::Config(
                "operation_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Page fetching, acquisition-method, and page-cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Reader API endpoint (pre-rendered markdown).
    pub reader_endpoint: String,
    /// Optional reader API key; the reader works without one at lower limits.
    pub reader_api_key: Option<String>,
    /// Scrape API endpoint.
    pub scrape_endpoint: String,
    /// Scrape API key; the scrape method is skipped without one.
    pub scrape_api_key: Option<String>,
    /// Per-method HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Default maximum page length in characters.
    pub default_max_length: usize,
    /// How long paginated content stays cached, in seconds.
    pub cache_ttl_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            reader_endpoint: "https://r.jina.ai/".into(),
            reader_api_key: None,
            scrape_endpoint: "https://scrape.serper.dev".into(),
            scrape_api_key: None,
            timeout_seconds: 30,
            default_max_length: 50_000,
            cache_ttl_secs: 3600,
        }
    }
}

impl FetchConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.default_max_length == 0 {
            return Err(SearchError::Config(
                "default_max_length must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
