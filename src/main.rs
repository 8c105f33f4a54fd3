/// flowrun: execution service for conditional flow diagrams
///
/// Serves:
/// - Diagram management API at /api/diagrams/*
/// - Run sessions at /api/diagrams/{id}/runs and /api/runs/*
/// - Provider credentials at /api/credentials/{provider}
/// - Health check at /healthz

use flowrun::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration comes from FLOWRUN_* environment variables
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
