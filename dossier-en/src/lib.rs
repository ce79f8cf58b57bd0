//! dossier-en library interface
//!
//! Exposes the enrichment pipeline and HTTP surface for integration testing

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod rank;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::AnalysisAdapter;
use crate::cache::ResultCache;
use crate::gateway::ProviderGateway;
use crate::models::ResearchRun;
use dossier_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Optional write-through result cache; the service runs fine without it
    pub cache: Option<ResultCache>,
    /// Run snapshots the API serves (orchestrators write through here)
    pub runs: Arc<RwLock<HashMap<Uuid, ResearchRun>>>,
    /// Cancellation tokens for active runs
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Provider gateways built from configuration
    pub gateways: Vec<Arc<ProviderGateway>>,
    /// Analysis adapter, when configured
    pub analysis: Option<Arc<dyn AnalysisAdapter>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last run failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        event_bus: EventBus,
        cache: Option<ResultCache>,
        gateways: Vec<Arc<ProviderGateway>>,
        analysis: Option<Arc<dyn AnalysisAdapter>>,
    ) -> Self {
        Self {
            event_bus,
            cache,
            runs: Arc::new(RwLock::new(HashMap::new())),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            gateways,
            analysis,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::research_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
