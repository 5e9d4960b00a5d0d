//! Intermediate artifacts of a turn, for inspection only.
//!
//! Nothing recorded here is ever fed back into generation.

use chrono::{DateTime, Utc};
use docbot_core::Document;
use serde::{Deserialize, Serialize};

use crate::assembler::render_debug_markdown;

/// Receives a turn's intermediate artifacts as they are produced.
///
/// Both callbacks fire before `RagPipeline::process` returns, so a sink
/// always sees them before the first answer chunk.
pub trait TraceSink: Send {
    fn standalone_question(&mut self, question: &str);

    fn retrieved_documents(&mut self, docs: &[Document]);
}

/// Collects one turn's artifacts.
#[derive(Debug, Clone, Default)]
pub struct TurnTrace {
    pub standalone_question: Option<String>,
    pub documents: Vec<Document>,
}

impl TraceSink for TurnTrace {
    fn standalone_question(&mut self, question: &str) {
        self.standalone_question = Some(question.to_string());
    }

    fn retrieved_documents(&mut self, docs: &[Document]) {
        self.documents.extend_from_slice(docs);
    }
}

impl TurnTrace {
    /// Close the trace into a record once the answer is known.
    pub fn into_record(self, user_question: &str, assistant_answer: &str) -> DebugRecord {
        DebugRecord {
            user_question: user_question.to_string(),
            standalone_question: self.standalone_question.unwrap_or_default(),
            assistant_answer: assistant_answer.to_string(),
            rendered_context: render_debug_markdown(&self.documents),
            recorded_at: Utc::now(),
        }
    }
}

/// One completed turn as seen by the debug view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugRecord {
    pub user_question: String,
    pub standalone_question: String,
    pub assistant_answer: String,
    /// Retrieved documents as markdown
    pub rendered_context: String,
    pub recorded_at: DateTime<Utc>,
}

impl DebugRecord {
    /// `user question / standalone question` heading.
    pub fn label(&self) -> String {
        format!("{} / {}", self.user_question, self.standalone_question)
    }
}

/// Append-only log of debug records for a session.
#[derive(Debug, Clone, Default)]
pub struct DebugTrace {
    records: Vec<DebugRecord>,
}

impl DebugTrace {
    pub fn push(&mut self, record: DebugRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DebugRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&DebugRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
