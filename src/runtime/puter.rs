/// Puter chat completion provider
///
/// Goes through Puter's driver endpoint (`POST {base}/drivers/call`) with the
/// `puter-chat-completion` interface. The auth token is optional.

use crate::runtime::executor::ExecutorFailure;
use crate::runtime::prompt::CompletionProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct PuterProvider {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl PuterProvider {
    pub fn new(http: Client, base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }
}

/// Pull the reply text out of a driver response
fn reply_text(body: &Value) -> String {
    let result = body.get("result").unwrap_or(body);
    if let Some(content) = result.pointer("/message/content") {
        return match content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
    }
    match result {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    Some(match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    })
}

#[async_trait]
impl CompletionProvider for PuterProvider {
    fn name(&self) -> &'static str {
        "Puter"
    }

    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        _temperature: Option<f64>,
    ) -> Result<String, ExecutorFailure> {
        let body = json!({
            "interface": "puter-chat-completion",
            "driver": "ai-chat",
            "method": "complete",
            "args": {
                "messages": [{ "role": "user", "content": prompt }],
                "model": model,
            }
        });

        let mut request = self
            .http
            .post(format!("{}/drivers/call", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutorFailure::Provider(format!("Puter error: {}", e)))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExecutorFailure::Provider(format!("Puter error: {}", e)))?;

        let failed = !status.is_success() || payload.get("success") == Some(&Value::Bool(false));
        if failed {
            let message = error_message(&payload).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ExecutorFailure::Provider(format!("Puter error: {}", message)));
        }

        Ok(reply_text(&payload))
    }
}
