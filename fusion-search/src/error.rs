//! Error types for the fusion-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.

/// Errors that can occur during search dispatch and page fetching.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The dispatcher holds no providers at all.
    #[error("no search providers available")]
    NoProviders,

    /// An HTTP request to a provider or page failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse a provider or page response.
    #[error("parse error: {0}")]
    Parse(String),

    /// A provider signalled rate limiting or quota exhaustion.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An operation exceeded its overall time budget.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A previous construction attempt failed and the retry cooldown is
    /// still running.
    #[error("search dispatcher is initializing, retry in {retry_after_secs}s")]
    Initializing {
        /// Seconds until the next construction attempt is permitted.
        retry_after_secs: u64,
    },

    /// The search dispatcher could not be constructed.
    #[error("search dispatcher unavailable: {0}")]
    Unavailable(String),

    /// Reader, scrape, and direct fetching all failed for a URL.
    #[error("all fetching methods failed: {0}")]
    AllMethodsFailed(String),

    /// A page beyond the first was requested for a URL with no cached pages.
    #[error("page cache not found for URL: {0}; fetch the URL first")]
    PageNotCached(String),

    /// A page number outside the cached page range was requested.
    #[error("invalid page number {requested}, should be between 1-{total}")]
    InvalidPage {
        /// The requested page number.
        requested: usize,
        /// Number of pages cached for the URL.
        total: usize,
    },

    /// A request argument was rejected before any work was done.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SearchError {
    /// Whether this error signals rate limiting.
    ///
    /// True for [`SearchError::RateLimited`] and for any error whose message
    /// has a word `rate`, `429`, or one starting with `limit`, `ratelimit`
    /// or `quota` (case-insensitive). Words like `generate` do not count.
    pub fn is_rate_limit(&self) -> bool {
        if matches!(self, Self::RateLimited(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .any(is_rate_limit_word)
    }

    /// Whether the caller should simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Initializing { .. } | Self::Unavailable(_)
        )
    }
}

fn is_rate_limit_word(word: &str) -> bool {
    matches!(word, "rate" | "rates" | "429")
        || ["limit", "ratelimit", "quota"]
            .iter()
            .any(|prefix| word.starts_with(prefix))
}

/// Convenience type alias for fusion-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
