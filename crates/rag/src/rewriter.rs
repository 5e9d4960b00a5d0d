//! Standalone question rewriting.
//!
//! A follow-up like "How do I run it?" means nothing to the vector index.
//! One completion turns it into a standalone question using the buffered
//! history; statements and standalone questions come back unchanged.

use std::sync::Arc;

use docbot_core::turn::render_transcript;
use docbot_core::{ConversationTurn, Provider, ProviderError, ProviderRequest};
use tracing::debug;

use crate::prompts::PromptTemplate;

pub struct QuestionRewriter {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    prompt: PromptTemplate,
}

impl QuestionRewriter {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            prompt: PromptTemplate::standalone_question(),
        }
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// The prompt sent for `question` given `history`.
    pub fn render_prompt(&self, question: &str, history: &[ConversationTurn]) -> String {
        self.prompt.format(&[
            ("chat_history", &render_transcript(history)),
            ("question", question),
        ])
    }

    /// Rewrite `question` into a standalone question.
    pub async fn rewrite(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ProviderError> {
        let request = ProviderRequest::prompt(
            self.model.clone(),
            self.temperature,
            self.render_prompt(question, history),
        );

        let response = self.provider.complete(request).await?;
        let standalone = response.message.content.trim();

        if standalone.is_empty() {
            debug!("Rewrite came back empty, keeping the original question");
            return Ok(question.to_string());
        }

        debug!(original = question, standalone, "Question rewritten");
        Ok(standalone.to_string())
    }
}
