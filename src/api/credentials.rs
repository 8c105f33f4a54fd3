/// Provider credential endpoint
///
/// PUT /api/credentials/{provider}  Body: { "apiKey": "..." }
/// Keys are never returned by the API. Only the Gemini key is runtime-settable;
/// the Puter token comes from configuration.

use crate::api::AppState;
use crate::credentials::GEMINI_CREDENTIAL;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::put,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub api_key: String,
}

pub fn create_credential_routes() -> Router<AppState> {
    Router::new().route("/api/credentials/{provider}", put(set_credential))
}

async fn set_credential(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<CredentialRequest>,
) -> StatusCode {
    let provider = provider.to_ascii_lowercase();
    if provider != GEMINI_CREDENTIAL {
        tracing::error!("Rejected credential for unknown provider '{}'", provider);
        return StatusCode::NOT_FOUND;
    }
    if request.api_key.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    state.credentials.set(&provider, request.api_key).await;
    tracing::info!("🔑 Updated {} credential", provider);
    StatusCode::NO_CONTENT
}
