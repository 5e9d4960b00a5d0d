//! Token-bounded conversation memory.
//!
//! Holds completed turns oldest first. After every save the rendered
//! transcript fits the ceiling, unless the most recent turn alone exceeds
//! it; that turn is kept whole and nothing older survives.

use std::sync::Arc;

use docbot_core::turn::render_transcript;
use docbot_core::{ConversationTurn, TokenCounter};
use tracing::debug;

pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
    ceiling: usize,
    counter: Arc<dyn TokenCounter>,
}

impl ConversationMemory {
    /// Create an empty memory bounded to `ceiling` tokens.
    pub fn new(ceiling: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            turns: Vec::new(),
            ceiling,
            counter,
        }
    }

    /// Buffered turns, oldest first.
    pub fn load(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Append a turn, then evict from the front until the transcript fits.
    pub fn save(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);

        let mut evicted = 0;
        while self.turns.len() > 1 && self.token_count() > self.ceiling {
            self.turns.remove(0);
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.turns.len(),
                ceiling = self.ceiling,
                "Evicted oldest turns from memory"
            );
        }
        if self.turns.len() == 1 && self.token_count() > self.ceiling {
            debug!(ceiling = self.ceiling, "Single turn exceeds memory ceiling, kept whole");
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// `Human: …\nAI: …` transcript of the buffered turns.
    pub fn render(&self) -> String {
        render_transcript(&self.turns)
    }

    /// Tokens in the rendered transcript.
    pub fn token_count(&self) -> usize {
        self.counter.count(&self.render())
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("turns", &self.turns.len())
            .field("ceiling", &self.ceiling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn memory(ceiling: usize) -> ConversationMemory {
        ConversationMemory::new(ceiling, Arc::new(WordCounter))
    }

    #[test]
    fn starts_empty() {
        let mem = memory(100);
        assert!(mem.is_empty());
        assert_eq!(mem.render(), "");
        assert_eq!(mem.token_count(), 0);
    }

    #[test]
    fn keeps_turns_under_ceiling() {
        let mut mem = memory(100);
        mem.save(ConversationTurn::new("q1", "a1"));
        mem.save(ConversationTurn::new("q2", "a2"));
        assert_eq!(mem.len(), 2);
        assert_eq!(mem.render(), "Human: q1\nAI: a1\nHuman: q2\nAI: a2");
    }

    #[test]
    fn evicts_oldest_first() {
        // Each turn renders to 4 words: "Human: qN AI: aN".
        let mut mem = memory(8);
        mem.save(ConversationTurn::new("q1", "a1"));
        mem.save(ConversationTurn::new("q2", "a2"));
        mem.save(ConversationTurn::new("q3", "a3"));

        assert_eq!(mem.len(), 2);
        assert_eq!(mem.load()[0].question, "q2");
        assert_eq!(mem.load()[1].question, "q3");
        assert!(mem.token_count() <= mem.ceiling());
    }

    #[test]
    fn oversized_turn_is_kept_alone() {
        let mut mem = memory(5);
        mem.save(ConversationTurn::new("q1", "a1"));
        let long_answer = vec!["word"; 20].join(" ");
        mem.save(ConversationTurn::new("q2", long_answer.clone()));

        assert_eq!(mem.len(), 1);
        assert_eq!(mem.load()[0].answer, long_answer);
        assert!(mem.token_count() > mem.ceiling());
    }

    #[test]
    fn bound_holds_after_every_save() {
        let mut mem = memory(12);
        for i in 0..20 {
            let answer = vec!["x"; i % 5 + 1].join(" ");
            mem.save(ConversationTurn::new(format!("q{i}"), answer));
            assert!(mem.token_count() <= mem.ceiling() || mem.len() == 1);
            assert_eq!(mem.load().last().unwrap().question, format!("q{i}"));
        }
    }

    #[test]
    fn greeting_counts_toward_ceiling() {
        let mut mem = memory(6);
        mem.save(ConversationTurn::greeting("Welcome there"));
        mem.save(ConversationTurn::new("q1", "a1"));
        // "AI: Welcome there" (3) + "Human: q1 AI: a1" (4) > 6
        assert_eq!(mem.len(), 1);
        assert_eq!(mem.load()[0].question, "q1");
    }

    #[test]
    fn clear_empties() {
        let mut mem = memory(100);
        mem.save(ConversationTurn::new("q", "a"));
        mem.clear();
        assert!(mem.is_empty());
    }
}
