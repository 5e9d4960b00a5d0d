//! Grounded answer generation.

use std::sync::Arc;

use docbot_core::provider::ChunkReceiver;
use docbot_core::{Provider, ProviderError, ProviderRequest};
use tracing::debug;

use crate::prompts::PromptTemplate;

/// Streams an answer restricted to the documentation, citing sources as
/// markdown links.
pub struct AnswerGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    prompt: PromptTemplate,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            prompt: PromptTemplate::rag(),
        }
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn render_prompt(&self, question: &str, context: &str, history: &str) -> String {
        self.prompt.format(&[
            ("chat_history", history),
            ("context", context),
            ("question", question),
        ])
    }

    /// Start a streamed completion for the answer.
    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &str,
    ) -> Result<ChunkReceiver, ProviderError> {
        let mut request = ProviderRequest::prompt(
            self.model.clone(),
            self.temperature,
            self.render_prompt(question, context, history),
        );
        request.stream = true;

        debug!(provider = self.provider.name(), model = %self.model, "Generating answer");
        self.provider.stream(request).await
    }
}
