/// Server setup and initialization
///
/// Wires together storage, registry, credentials, executors and HTTP routes.

use crate::{
    api::{create_api_routes, AppState},
    config::Config,
    credentials::{CredentialStore, MemoryCredentialStore},
    diagram::{registry::DiagramRegistry, storage::DiagramStorage},
    runtime::{ExecutorRegistry, SessionTable},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;

/// Build the router over an already assembled state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_api_routes().with_state(state))
}

/// Assemble application state around an opened storage
pub async fn build_state(config: &Config, storage: DiagramStorage) -> Result<AppState> {
    tracing::info!("📊 Initializing diagram registry");
    let registry = Arc::new(DiagramRegistry::new(storage.clone()));
    registry
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load diagrams from storage: {}", e))?;

    let credentials: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::from_config(config));

    tracing::info!("⚙️ Registering node executors");
    let executors = ExecutorRegistry::from_config(config, Arc::clone(&credentials));

    let ttl = config.engine.run_ttl();
    let sessions = Arc::new(SessionTable::with_limits(ttl, config.engine.max_runs));
    SessionTable::spawn_sweeper(&sessions, (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60)));

    Ok(AppState {
        storage,
        registry,
        sessions,
        executors,
        credentials,
        stop_policy: config.engine.stop_policy,
    })
}

/// Create the main Axum application with all routes
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
    std::fs::create_dir_all(&config.database.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    let storage = DiagramStorage::open(config.database.database_path())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open diagram database: {}", e))?;

    let state = build_state(&config, storage).await?;
    tracing::info!("🛑 Stop policy: {:?}", state.stop_policy);

    let app = build_router(state);
    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting flowrun server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
