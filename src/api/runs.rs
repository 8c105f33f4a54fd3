/// Run session REST API endpoints
///
/// A run is created idle from the registry's current compiled diagram; the client
/// then drives it with events (START, ANSWER, STOP, RESET) and reads snapshots.

use crate::api::AppState;
use crate::runtime::{spawn_session, FlowEvent, RunSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCreated {
    pub run_id: Uuid,
    pub snapshot: RunSnapshot,
}

pub fn create_run_routes() -> Router<AppState> {
    Router::new()
        .route("/api/diagrams/{id}/runs", post(create_run))
        .route("/api/runs/{run_id}", get(get_run).delete(delete_run))
        .route("/api/runs/{run_id}/events", post(send_event))
}

/// POST /api/diagrams/{id}/runs
async fn create_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RunCreated>), StatusCode> {
    let diagram = state.registry.get_diagram(&id).ok_or(StatusCode::NOT_FOUND)?;

    let handle = spawn_session(Arc::clone(&diagram), state.executors.clone(), state.stop_policy);
    let run_id = handle.id();
    let snapshot = handle.snapshot();
    if let Err(e) = state.sessions.insert(handle).await {
        tracing::error!("Failed to create run for diagram '{}': {}", id, e);
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    tracing::info!("▶️ Created run {} for diagram '{}'", run_id, id);
    Ok((StatusCode::CREATED, Json(RunCreated { run_id, snapshot })))
}

/// GET /api/runs/{run_id}
async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunSnapshot>, StatusCode> {
    let handle = state.sessions.get(&run_id).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(handle.snapshot()))
}

/// Apply an event and answer with the snapshot taken right after it
///
/// POST /api/runs/{run_id}/events
/// Body: { "type": "ANSWER", "nodeId": "q1", "answer": "yes" }
async fn send_event(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(event): Json<FlowEvent>,
) -> Result<Json<RunSnapshot>, StatusCode> {
    let handle = state.sessions.get(&run_id).await.ok_or(StatusCode::NOT_FOUND)?;
    match handle.send(event).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            tracing::error!("Failed to deliver event to run {}: {}", run_id, e);
            state.sessions.remove(&run_id).await;
            Err(StatusCode::GONE)
        }
    }
}

/// DELETE /api/runs/{run_id}
async fn delete_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, StatusCode> {
    let handle = state.sessions.remove(&run_id).await.ok_or(StatusCode::NOT_FOUND)?;
    if let Err(e) = handle.shutdown().await {
        tracing::warn!("⚠️ Run {} was already gone: {}", run_id, e);
    }
    tracing::info!("⏹️ Discarded run {}", run_id);
    Ok(Json(json!({ "message": format!("Run {} discarded", run_id) })))
}
