/// AI prompt executors
///
/// Gemini and Puter nodes share one contract: render the node's prompt template
/// against the answers, send it to a completion provider with the node's model, and
/// record the returned text as the answer.

use crate::diagram::{Answers, Node};
use crate::runtime::executor::{ExecutorFailure, NodeExecutor};
use crate::runtime::template::render_template;
use async_trait::async_trait;
use serde_json::Value;

/// A text completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Display name used in logs and error messages
    fn name(&self) -> &'static str;

    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: Option<f64>,
    ) -> Result<String, ExecutorFailure>;
}

#[derive(Debug, Clone)]
pub struct PromptExecutor<P> {
    provider: P,
}

impl<P: CompletionProvider> PromptExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Render `template` and ask the provider for a completion
    pub async fn run(
        &self,
        template: &str,
        model: &str,
        answers: &Answers,
        temperature: Option<f64>,
    ) -> Result<String, ExecutorFailure> {
        let prompt = render_template(template, answers);
        tracing::debug!(
            "🤖 {} prompt for model {} ({} chars)",
            self.provider.name(),
            model,
            prompt.len()
        );
        self.provider.complete(&prompt, model, temperature).await
    }
}

#[async_trait]
impl<P: CompletionProvider> NodeExecutor for PromptExecutor<P> {
    async fn execute(&self, node: &Node, answers: &Answers) -> Result<Value, ExecutorFailure> {
        let template = node
            .data_str("prompt")
            .ok_or_else(|| ExecutorFailure::invalid_node(node, "missing 'prompt'"))?;
        let model = node
            .data_str("model")
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| ExecutorFailure::invalid_node(node, "missing 'model'"))?;
        let temperature = node.data.get("temperature").and_then(Value::as_f64);

        self.run(template, model, answers, temperature)
            .await
            .map(Value::String)
    }
}
