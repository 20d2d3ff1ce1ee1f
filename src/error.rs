//! Error types for the search-fusion shell.

use fusion_search::SearchError;

/// Errors raised by configuration loading and the stdio bridge.
///
/// Search and fetch failures are not errors at this level: they are turned
/// into error envelopes and sent back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// Configuration could not be read, parsed, or validated.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON line protocol could not be read or written.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<SearchError> for FusionError {
    fn from(err: SearchError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FusionError>;
