/// Google Gemini completion provider
///
/// Calls `POST {base}/v1beta/models/{model}:generateContent` with the API key read
/// from the credential store on every call.

use crate::credentials::{CredentialStore, GEMINI_CREDENTIAL};
use crate::runtime::executor::ExecutorFailure;
use crate::runtime::prompt::CompletionProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_TEMPERATURE: f64 = 1.0;

pub struct GeminiProvider {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

impl GeminiProvider {
    pub fn new(http: Client, base_url: &str, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: Option<f64>,
    ) -> Result<String, ExecutorFailure> {
        let api_key = self
            .credentials
            .get(GEMINI_CREDENTIAL)
            .await
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ExecutorFailure::MissingCredential(self.name().to_string()))?;

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
        };

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutorFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|error| error.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            return Err(ExecutorFailure::Provider(format!("Gemini API error: {}", message)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExecutorFailure::Decode(e.to_string()))?;
        Ok(parsed.first_text().unwrap_or_else(|| "No response".to_string()))
    }
}
