/// Diagram management REST API endpoints
///
/// CRUD over stored diagrams. Every write is compiled first, so a diagram that would
/// not run is rejected before it reaches storage, and then hot-reloaded into the
/// registry so new runs pick it up immediately.

use crate::api::AppState;
use crate::diagram::{CompiledDiagram, Diagram};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Response for diagram creation/update operations
#[derive(Debug, Serialize)]
pub struct DiagramResponse {
    pub id: String,
    pub message: String,
    /// Compilation warnings for the saved diagram
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Listing filters: `?author=...` or `?public=true`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub author: Option<String>,
    #[serde(default)]
    pub public: bool,
}

pub fn create_diagram_routes() -> Router<AppState> {
    Router::new()
        .route("/api/diagrams", get(list_diagrams).post(create_diagram))
        .route(
            "/api/diagrams/{id}",
            get(get_diagram).put(update_diagram).delete(delete_diagram),
        )
}

/// Title and description are required; the graph must compile
fn validate(diagram: &Diagram) -> Result<Vec<String>, StatusCode> {
    if diagram.title.trim().is_empty() || diagram.description.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    match CompiledDiagram::compile(diagram.clone()) {
        Ok(compiled) => Ok(compiled.warnings().to_vec()),
        Err(e) => {
            tracing::warn!("⚠️ Rejected diagram '{}': {}", diagram.title, e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// Persist and hot-reload
async fn store(state: &AppState, diagram: &Diagram) -> Result<(), StatusCode> {
    if let Err(e) = state.storage.save_diagram(diagram).await {
        tracing::error!("Failed to save diagram {}: {}", diagram.id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if let Err(e) = state.registry.reload_diagram(&diagram.id).await {
        tracing::error!("Failed to reload diagram {} into registry: {}", diagram.id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(())
}

/// Create a new diagram
///
/// POST /api/diagrams
/// Body: the editor document; `id` is generated when omitted
async fn create_diagram(
    State(state): State<AppState>,
    Json(mut diagram): Json<Diagram>,
) -> Result<(StatusCode, Json<DiagramResponse>), StatusCode> {
    let warnings = validate(&diagram)?;
    if diagram.id.is_empty() {
        diagram.id = uuid::Uuid::new_v4().to_string();
    }
    diagram.created_at = None;

    match state.storage.get_diagram(&diagram.id).await {
        Ok(Some(_)) => return Err(StatusCode::CONFLICT),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to look up diagram {}: {}", diagram.id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    store(&state, &diagram).await?;
    tracing::info!("🔥 Created diagram: {} ({})", diagram.id, diagram.title);

    Ok((
        StatusCode::CREATED,
        Json(DiagramResponse {
            id: diagram.id.clone(),
            message: format!("Diagram '{}' created successfully", diagram.title),
            warnings,
        }),
    ))
}

/// List diagram metadata, most recently updated first
///
/// GET /api/diagrams[?author=...|?public=true]
async fn list_diagrams(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, StatusCode> {
    match state.storage.list_diagrams().await {
        Ok(diagrams) => {
            let diagrams: Vec<_> = diagrams
                .into_iter()
                .filter(|d| !query.public || d.public)
                .filter(|d| query.author.is_none() || d.author == query.author)
                .collect();
            Ok(Json(json!({ "totalCount": diagrams.len(), "diagrams": diagrams })))
        }
        Err(e) => {
            tracing::error!("Failed to list diagrams: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/diagrams/{id}
async fn get_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Diagram>, StatusCode> {
    match state.storage.get_diagram(&id).await {
        Ok(Some(diagram)) => Ok(Json(diagram)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get diagram {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Replace an existing diagram
///
/// PUT /api/diagrams/{id}
async fn update_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut diagram): Json<Diagram>,
) -> Result<Json<DiagramResponse>, StatusCode> {
    diagram.id = id.clone();

    let existing = match state.storage.get_diagram(&id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to look up diagram {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let warnings = validate(&diagram)?;
    diagram.created_at = existing.created_at;

    store(&state, &diagram).await?;
    tracing::info!("🔥 Hot-reloaded diagram: {} ({})", diagram.id, diagram.title);

    Ok(Json(DiagramResponse {
        id: diagram.id.clone(),
        message: format!("Diagram '{}' updated successfully", diagram.title),
        warnings,
    }))
}

/// DELETE /api/diagrams/{id}
///
/// Runs already started keep their compiled copy and finish normally.
async fn delete_diagram(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.storage.delete_diagram(&id).await {
        Ok(true) => {
            state.registry.remove_diagram(&id);
            tracing::info!("🗑️ Deleted diagram: {}", id);
            Ok(Json(json!({ "message": format!("Diagram '{}' deleted successfully", id) })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete diagram {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
