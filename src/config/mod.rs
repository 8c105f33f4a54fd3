/// Configuration management for the flowrun service
///
/// Handles server binding, storage location, engine policy and provider endpoints.
/// Every value can be overridden through environment variables for container deployment.

use crate::runtime::{StopPolicy, DEFAULT_MAX_RUNS, DEFAULT_RUN_TTL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub providers: ProviderConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding flowrun.db (default: "data")
    pub data_dir: String,
}

impl DatabaseConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("flowrun.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// What STOP does to an executor call that is still in flight
    pub stop_policy: StopPolicy,
    /// Seconds a run may go without being read or driven before it is discarded
    pub run_ttl_secs: u64,
    pub max_runs: usize,
}

impl EngineConfig {
    pub fn run_ttl(&self) -> Duration {
        Duration::from_secs(self.run_ttl_secs)
    }
}

/// External AI provider endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub gemini_base_url: String,
    /// Initial Gemini key; can be replaced at runtime through the credentials API
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub puter_base_url: String,
    #[serde(skip_serializing)]
    pub puter_auth_token: Option<String>,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("FLOWRUN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("FLOWRUN_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("FLOWRUN_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            engine: EngineConfig {
                stop_policy: std::env::var("FLOWRUN_STOP_POLICY")
                    .ok()
                    .and_then(|raw| match raw.parse() {
                        Ok(policy) => Some(policy),
                        Err(e) => {
                            tracing::warn!("⚠️ Ignoring FLOWRUN_STOP_POLICY: {}", e);
                            None
                        }
                    })
                    .unwrap_or_default(),
                run_ttl_secs: std::env::var("FLOWRUN_RUN_TTL_SECS")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(DEFAULT_RUN_TTL.as_secs()),
                max_runs: std::env::var("FLOWRUN_MAX_RUNS")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(DEFAULT_MAX_RUNS),
            },
            providers: ProviderConfig {
                gemini_base_url: std::env::var("FLOWRUN_GEMINI_BASE_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
                gemini_api_key: non_empty_env("GEMINI_API_KEY"),
                puter_base_url: std::env::var("FLOWRUN_PUTER_BASE_URL")
                    .unwrap_or_else(|_| "https://api.puter.com".to_string()),
                puter_auth_token: non_empty_env("PUTER_AUTH_TOKEN"),
            },
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
