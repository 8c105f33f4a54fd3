/// Node executors
///
/// Every effectful node kind (HTTP request, Gemini, Puter) is handled by a
/// `NodeExecutor` registered under that kind. Each invocation runs in its own tokio
/// task, so a panicking executor surfaces as a `JoinError` and is turned into an
/// ordinary node failure.

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::diagram::{Answers, Node, NodeKind};
use crate::runtime::engine::Invocation;
use crate::runtime::gemini::GeminiProvider;
use crate::runtime::http::HttpExecutor;
use crate::runtime::prompt::PromptExecutor;
use crate::runtime::puter::PuterProvider;
use async_trait::async_trait;
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

/// Why a node did not produce an answer
///
/// The `Display` text is what gets recorded as `{ "error": ... }` in the answers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorFailure {
    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0} API key not configured")]
    MissingCredential(String),

    /// Provider-reported error, already prefixed with the provider name
    #[error("{0}")]
    Provider(String),

    #[error("Node '{node_id}' is misconfigured: {reason}")]
    InvalidNode { node_id: String, reason: String },

    #[error("No executor registered for {0:?} nodes")]
    MissingExecutor(NodeKind),

    #[error("Node '{0}' does not exist in the diagram")]
    UnknownNode(String),

    #[error("Node '{0}' has an unsupported type")]
    UnknownKind(String),

    #[error("Node '{0}' revisited without waiting for input")]
    Cycle(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),

    #[error("Execution cancelled")]
    Cancelled,
}

impl ExecutorFailure {
    pub fn invalid_node(node: &Node, reason: impl Into<String>) -> Self {
        ExecutorFailure::InvalidNode {
            node_id: node.id.clone(),
            reason: reason.into(),
        }
    }

    /// Map a task join error (panic or abort) to a failure
    pub fn from_join_error(error: JoinError) -> Self {
        if !error.is_panic() {
            return ExecutorFailure::Cancelled;
        }
        let payload = error.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ExecutorFailure::Panicked(message)
    }
}

/// Performs the side effect of one node kind
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &Node, answers: &Answers) -> Result<Value, ExecutorFailure>;
}

/// Node kind → executor lookup
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeKind, Arc<dyn NodeExecutor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for a node kind
    pub fn with(mut self, kind: NodeKind, executor: Arc<dyn NodeExecutor>) -> Self {
        self.executors.insert(kind, executor);
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&kind).cloned()
    }

    /// The production set of executors: HTTP, Gemini and Puter
    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialStore>) -> Self {
        let client = reqwest::Client::new();
        let providers = &config.providers;

        Self::new()
            .with(
                NodeKind::HttpRequest,
                Arc::new(HttpExecutor::new(client.clone())),
            )
            .with(
                NodeKind::Gemini,
                Arc::new(PromptExecutor::new(GeminiProvider::new(
                    client.clone(),
                    &providers.gemini_base_url,
                    credentials,
                ))),
            )
            .with(
                NodeKind::Puter,
                Arc::new(PromptExecutor::new(PuterProvider::new(
                    client,
                    &providers.puter_base_url,
                    providers.puter_auth_token.clone(),
                ))),
            )
    }

    /// Run an invocation on its own task
    pub fn spawn(&self, invocation: Invocation) -> JoinHandle<Result<Value, ExecutorFailure>> {
        let executor = self.get(invocation.node.kind);
        tokio::spawn(async move {
            let Invocation { id, node, answers } = invocation;
            let Some(executor) = executor else {
                return Err(ExecutorFailure::MissingExecutor(node.kind));
            };

            let start_time = std::time::Instant::now();
            tracing::info!("🚀 Starting node execution: {} (type: {:?}, invocation {})", node.id, node.kind, id);
            let result = executor.execute(&node, &answers).await;
            match &result {
                Ok(_) => tracing::info!("✅ Node execution completed: {} in {:?}", node.id, start_time.elapsed()),
                Err(e) => tracing::error!(
                    "❌ Node execution failed: {} in {:?} - Error: {}",
                    node.id,
                    start_time.elapsed(),
                    e
                ),
            }
            result
        })
    }
}
