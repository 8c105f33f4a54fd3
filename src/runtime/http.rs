/// HTTP request node executor
///
/// Node data: `{ "endpoint": "https://...", "method": "GET", "responseType": "json" }`.
/// Requests carry `Content-Type: application/json` and no body. There are no retries
/// and no timeout beyond the client's own.

use crate::diagram::{Answers, Node};
use crate::runtime::executor::{ExecutorFailure, NodeExecutor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method '{}'", other)),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// How the response body is turned into an answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "text" => Ok(ResponseFormat::Text),
            other => Err(format!("unsupported response type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(
        &self,
        endpoint: &str,
        method: HttpMethod,
        format: ResponseFormat,
    ) -> Result<Value, ExecutorFailure> {
        tracing::debug!("🌍 HTTP Request: {:?} {}", method, endpoint);

        let response = self
            .client
            .request(method.into(), endpoint)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ExecutorFailure::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!("📡 Response status: {}", status);
        if !status.is_success() {
            return Err(ExecutorFailure::HttpStatus(status.as_u16()));
        }

        match format {
            ResponseFormat::Json => response
                .json::<Value>()
                .await
                .map_err(|e| ExecutorFailure::Decode(e.to_string())),
            ResponseFormat::Text => response
                .text()
                .await
                .map(Value::String)
                .map_err(|e| ExecutorFailure::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl NodeExecutor for HttpExecutor {
    async fn execute(&self, node: &Node, _answers: &Answers) -> Result<Value, ExecutorFailure> {
        let endpoint = node
            .data_str("endpoint")
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| ExecutorFailure::invalid_node(node, "missing 'endpoint'"))?;
        let method = node
            .data_str("method")
            .map(str::parse)
            .transpose()
            .map_err(|e: String| ExecutorFailure::invalid_node(node, e))?
            .unwrap_or_default();
        let format = node
            .data_str("responseType")
            .map(str::parse)
            .transpose()
            .map_err(|e: String| ExecutorFailure::invalid_node(node, e))?
            .unwrap_or_default();

        self.fetch(endpoint, method, format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_editor_values() {
        assert_eq!("post".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!("DELETE".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert_eq!("text".parse::<ResponseFormat>(), Ok(ResponseFormat::Text));
    }
}
