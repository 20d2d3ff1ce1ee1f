//! Search bridge binary for stdin/stdout JSON communication.
//!
//! Usage: `search-fusion [CONFIG.toml]`. Without an argument the path is
//! taken from `SEARCH_FUSION_CONFIG`, and without either the defaults plus
//! environment variables are used.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use search_fusion::stdio::run_stdio_bridge;
use search_fusion::{FusionConfig, SearchFusionServer};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = FusionConfig::path_from_args(std::env::args().skip(1));
    let config = FusionConfig::load(path.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    // Held until exit so the file writer flushes.
    let _log_guard = search_fusion::logging::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    tracing::info!(
        config = ?path,
        google = config.providers.google.api_key.is_some() && config.providers.google.cse_id.is_some(),
        serper = config.providers.serper_api_key.is_some(),
        jina = config.providers.jina_api_key.is_some(),
        exa = config.providers.exa_api_key.is_some(),
        bing = config.providers.bing_api_key.is_some(),
        duckduckgo = config.providers.duckduckgo_enabled,
        scrape = config.fetch.scrape_api_key.is_some(),
        "search-fusion starting"
    );

    let server = Arc::new(SearchFusionServer::new(&config)?);

    run_stdio_bridge(server).await.map_err(|e| {
        tracing::error!(error = %e, "search-fusion exited with error");
        anyhow::anyhow!("search-fusion failed: {e}")
    })?;

    tracing::info!("search-fusion shut down cleanly");
    Ok(())
}
