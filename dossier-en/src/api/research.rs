//! Research run endpoints
//!
//! POST /research starts a run and returns immediately; progress arrives
//! over the SSE stream and GET /research/{id} serves the latest snapshot.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ResearchRun, RunState};
use crate::orchestrator::RunOrchestrator;
use crate::types::{EntityKind, EntityQuery, RunConfig};
use crate::AppState;

/// POST /research request body
#[derive(Debug, Deserialize)]
pub struct StartResearchRequest {
    /// Subject display name
    pub name: String,
    /// Known stable identifier (e.g., tax id)
    pub identifier: Option<String>,
    /// Subject kind (default: company)
    pub kind: Option<EntityKind>,
    /// Known aliases to widen the search
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Provider categories to use (default: all configured)
    pub categories: Option<Vec<crate::types::Source>>,
    /// Ranking depth override
    pub top_k: Option<usize>,
}

/// POST /research response body
#[derive(Debug, Serialize)]
pub struct StartResearchResponse {
    pub run_id: Uuid,
}

/// POST /research
///
/// Creates a run, spawns its orchestrator, and returns the run id.
pub async fn start_research(
    State(state): State<AppState>,
    Json(request): Json<StartResearchRequest>,
) -> ApiResult<Json<StartResearchResponse>> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let query = EntityQuery {
        name: request.name.trim().to_string(),
        identifier: request.identifier,
        kind: request.kind.unwrap_or(EntityKind::Company),
        aliases: request.aliases,
    };

    let mut config = RunConfig::default();
    if let Some(top_k) = request.top_k {
        config.top_k = top_k;
    }
    if let Some(categories) = request.categories {
        config.categories = categories;
    }

    let run = ResearchRun::new(query);
    let run_id = run.run_id;

    state.runs.write().await.insert(run_id, run.clone());

    let cancel_token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(run_id, cancel_token.clone());

    let mut orchestrator = RunOrchestrator::new(
        state.gateways.clone(),
        state.analysis.clone(),
        state.event_bus.clone(),
        config,
    )
    .with_registry(Arc::clone(&state.runs));
    if let Some(cache) = state.cache.clone() {
        orchestrator = orchestrator.with_cache(cache);
    }

    let tokens = Arc::clone(&state.cancellation_tokens);
    let last_error = Arc::clone(&state.last_error);

    tokio::spawn(async move {
        let finished = orchestrator.execute_run(run, cancel_token).await;

        if finished.state == RunState::Failed {
            let message = finished
                .failure
                .as_ref()
                .map(|f| f.error.clone())
                .unwrap_or_else(|| "run failed".to_string());
            *last_error.write().await = Some(message);
        }

        tokens.write().await.remove(&run_id);
    });

    tracing::info!(run_id = %run_id, "Research run accepted");

    Ok(Json(StartResearchResponse { run_id }))
}

/// GET /research/{run_id}
pub async fn get_research(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<ResearchRun>> {
    let runs = state.runs.read().await;
    match runs.get(&run_id) {
        Some(run) => Ok(Json(run.clone())),
        None => Err(ApiError::NotFound(format!("run {}", run_id))),
    }
}

/// POST /research/{run_id}/cancel
pub async fn cancel_research(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    {
        let runs = state.runs.read().await;
        match runs.get(&run_id) {
            None => return Err(ApiError::NotFound(format!("run {}", run_id))),
            Some(run) if run.is_terminal() => {
                return Err(ApiError::Conflict(format!(
                    "run {} already finished",
                    run_id
                )))
            }
            Some(_) => {}
        }
    }

    let tokens = state.cancellation_tokens.read().await;
    match tokens.get(&run_id) {
        Some(token) => {
            token.cancel();
            tracing::info!(run_id = %run_id, "Cancellation requested");
            Ok(Json(serde_json::json!({ "status": "cancelling" })))
        }
        None => Err(ApiError::Conflict(format!(
            "run {} is no longer cancellable",
            run_id
        ))),
    }
}

/// Build research routes
pub fn research_routes() -> Router<AppState> {
    Router::new()
        .route("/research", post(start_research))
        .route("/research/:run_id", get(get_research))
        .route("/research/:run_id/cancel", post(cancel_research))
}
