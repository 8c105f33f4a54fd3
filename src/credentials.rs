/// Local secret store for provider credentials
///
/// AI executors look their API key up here at call time, so a key set through the
/// API takes effect for the next invocation without restarting anything.

use crate::config::Config;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Provider name the Gemini executor reads its API key from
pub const GEMINI_CREDENTIAL: &str = "gemini";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, provider: &str) -> Option<String>;
    async fn set(&self, provider: &str, secret: String);
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with whatever keys the configuration carries
    pub fn from_config(config: &Config) -> Self {
        let mut secrets = HashMap::new();
        if let Some(key) = config.providers.gemini_api_key.clone() {
            tracing::info!("🔐 Gemini API key loaded from environment");
            secrets.insert(GEMINI_CREDENTIAL.to_string(), key);
        }
        Self {
            secrets: RwLock::new(secrets),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: &str) -> Option<String> {
        self.secrets.read().await.get(provider).cloned()
    }

    async fn set(&self, provider: &str, secret: String) {
        tracing::info!("🔐 Credential updated for provider: {}", provider);
        self.secrets
            .write()
            .await
            .insert(provider.to_string(), secret);
    }
}
