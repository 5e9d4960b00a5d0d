//! Token counting.
//!
//! Every budget decision in Docbot goes through a [`TokenCounter`]: the
//! query-length check, memory eviction, and the prompt-template reservation.

/// Counts tokens under one tokenizer.
///
/// Must be deterministic for a fixed model and cheap enough to call several
/// times per turn.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize;
}

/// Character-based estimate: ~4 characters per token, rounded up.
///
/// Accurate within ~10% for BPE tokenizers on English text. Used when no
/// real tokenizer is available for the configured model.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(HeuristicCounter.count(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(HeuristicCounter.count("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(HeuristicCounter.count("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        assert_eq!(HeuristicCounter.count(&"a".repeat(100)), 25);
    }
}
