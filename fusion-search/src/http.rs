//! Shared HTTP client construction and response helpers.
//!
//! Provides a configured [`reqwest::Client`] with browser-like User-Agent
//! rotation and optional proxying, plus status mapping shared by every
//! provider and acquisition method.

use crate::config::HttpConfig;
use crate::error::SearchError;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for provider and page requests.
///
/// The client has:
/// - Timeout from config
/// - Random User-Agent from built-in rotation list (or custom if configured)
/// - Optional proxy for all schemes
/// - At most 10 redirects
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed, or
/// [`SearchError::Config`] if the proxy URL is invalid.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, SearchError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(ref proxy_url) = config.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| SearchError::Config(format!("invalid proxy URL: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array; choose only returns None on empty slices.
        .unwrap_or(USER_AGENTS[0])
}

/// Map a non-success response to an error, passing successful ones through.
///
/// `429 Too Many Requests` becomes [`SearchError::RateLimited`] so the
/// dispatcher can log it distinctly; every other failure status becomes
/// [`SearchError::Http`].
pub(crate) fn check_status(
    label: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SearchError::RateLimited(format!("{label} returned HTTP 429")));
    }
    if !status.is_success() {
        return Err(SearchError::Http(format!("{label} returned HTTP {status}")));
    }
    Ok(response)
}

/// Map a transport-level failure for `label` into [`SearchError::Http`].
pub(crate) fn transport_error(label: &str, err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Http(format!("{label} request timed out: {err}"))
    } else {
        SearchError::Http(format!("{label} request failed: {err}"))
    }
}
