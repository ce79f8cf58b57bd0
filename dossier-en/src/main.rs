//! dossier-en - Enrichment Service
//!
//! **Module Identity:**
//! - Name: dossier-en (Enrichment)
//! - Port: 5731 (default)
//!
//! Researches a company, person, or politician by fanning out to external
//! data providers, consolidating what comes back, and driving phased
//! research runs whose analysis blocks are produced by an LLM adapter.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dossier_common::config::{default_config_path, load_toml_config};
use dossier_common::events::EventBus;
use dossier_en::cache::ResultCache;
use dossier_en::providers::{build_analysis_adapter, build_gateways};
use dossier_en::AppState;

const DEFAULT_PORT: u16 = 5731;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log filter can come from it
    let config_path = default_config_path().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let config = load_toml_config(&config_path).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = config.port.unwrap_or(DEFAULT_PORT);

    info!("Starting dossier-en (Enrichment) service");
    info!("Port: {}", port);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Optional sqlite result cache; the pipeline runs fine without it
    let cache = match &config.cache_path {
        Some(path) => match ResultCache::open(std::path::Path::new(path)).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Result cache unavailable; continuing without");
                None
            }
        },
        None => None,
    };

    // Provider gateways and analysis adapter from configuration
    let gateways = build_gateways(&config);
    let analysis = build_analysis_adapter(&config);
    if analysis.is_none() {
        tracing::warn!("No analysis key configured; analysis blocks will carry error markers");
    }

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let state = AppState::new(event_bus, cache, gateways, analysis);
    let app = dossier_en::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
