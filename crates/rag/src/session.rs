//! Per-user conversation state.

use chrono::{DateTime, Utc};
use docbot_core::ConversationTurn;
use uuid::Uuid;

use crate::memory::ConversationMemory;
use crate::prompts::WELCOME;
use crate::trace::{DebugRecord, DebugTrace};

/// One user's conversation: bounded memory plus the debug log.
///
/// The pipeline only reads a session while a turn runs; saving a turn
/// needs `&mut`, so a session can never have two turns in flight.
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    memory: ConversationMemory,
    debug_trace: DebugTrace,
}

impl ChatSession {
    /// A fresh session seeded with the welcome greeting.
    pub fn new(memory: ConversationMemory) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            memory,
            debug_trace: DebugTrace::default(),
        };
        session.seed_greeting();
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn debug_trace(&self) -> &DebugTrace {
        &self.debug_trace
    }

    /// The greeting the session was seeded with.
    pub fn greeting(&self) -> &str {
        WELCOME
    }

    pub fn record_debug(&mut self, record: DebugRecord) {
        self.debug_trace.push(record);
    }

    /// Forget everything and start over from the greeting.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.debug_trace.clear();
        self.seed_greeting();
        tracing::info!(session = %self.id, "Session cleared");
    }

    pub(crate) fn save(&mut self, turn: ConversationTurn) {
        self.memory.save(turn);
    }

    fn seed_greeting(&mut self) {
        self.memory.save(ConversationTurn::greeting(WELCOME));
    }
}
