//! Conversation turns.

use serde::{Deserialize, Serialize};

/// One completed exchange. Never mutated after creation.
///
/// A greeting seeded by the assistant is a turn with an empty question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// An assistant-only turn (no user question).
    pub fn greeting(answer: impl Into<String>) -> Self {
        Self::new(String::new(), answer)
    }

    /// Role-tagged transcript form: `Human: …\nAI: …`.
    ///
    /// The `Human:` line is omitted for greeting turns.
    pub fn render(&self) -> String {
        if self.question.is_empty() {
            format!("AI: {}", self.answer)
        } else {
            format!("Human: {}\nAI: {}", self.question, self.answer)
        }
    }
}

/// Render turns into one transcript, oldest first, joined by newlines.
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(ConversationTurn::render)
        .collect::<Vec<_>>()
        .join("\n")
}
