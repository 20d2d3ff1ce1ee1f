//! search-fusion: multi-provider web search and page fetching for tools.
//!
//! This crate wraps [`fusion_search`] in a request shell spoken over a
//! newline-delimited JSON protocol on stdin/stdout:
//! Request line → tool router → search gate / web fetcher → response line
//!
//! # Architecture
//!
//! - **Config**: TOML file plus environment overrides ([`config`])
//! - **Logging**: `tracing` to stderr and an optional rolling file ([`logging`])
//! - **Server**: envelopes for search, fetch, and status ([`server`])
//! - **Bridge**: concurrent JSON line loop ([`stdio`])

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod stdio;

pub use config::FusionConfig;
pub use error::{FusionError, Result};
pub use server::SearchFusionServer;
