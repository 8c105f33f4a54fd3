/// HTTP API Layer
///
/// REST endpoints for diagram management, run sessions and provider credentials.
/// Handlers log failures with `tracing::error!` and answer with a bare status code.

use crate::{
    credentials::CredentialStore,
    diagram::{registry::DiagramRegistry, storage::DiagramStorage},
    runtime::{ExecutorRegistry, SessionTable, StopPolicy},
};
use axum::Router;
use std::sync::Arc;

// Diagram CRUD (POST/GET/PUT/DELETE)
pub mod diagrams;

// Run sessions: create, inspect, send events, discard
pub mod runs;

// Provider credential updates
pub mod credentials;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Diagram storage for persistence
    pub storage: DiagramStorage,
    /// Hot-reload registry of compiled diagrams
    pub registry: Arc<DiagramRegistry>,
    /// Live run sessions
    pub sessions: Arc<SessionTable>,
    /// Executors handed to every new session
    pub executors: ExecutorRegistry,
    pub credentials: Arc<dyn CredentialStore>,
    pub stop_policy: StopPolicy,
}

/// All API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .merge(diagrams::create_diagram_routes())
        .merge(runs::create_run_routes())
        .merge(credentials::create_credential_routes())
}
