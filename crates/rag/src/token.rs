//! BPE token counting via `tiktoken-rs`.

use std::sync::Arc;

use docbot_core::{Error, HeuristicCounter, TokenCounter};
use tracing::{debug, warn};

/// Token counter using tiktoken-rs for exact BPE tokenization.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized.
    pub fn for_model(model: &str) -> Result<Self, Error> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => {
                debug!(model, "No tokenizer registered for model, using cl100k_base");
                tiktoken_rs::cl100k_base()
                    .map_err(|e| Error::Internal(format!("cl100k_base unavailable: {e}")))?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// The best counter available for `model`: BPE when the tokenizer loads,
/// otherwise the character heuristic.
///
/// The BPE ranks ship inside tiktoken-rs, so the heuristic only serves when
/// that bundled data fails to decode.
pub fn counter_for_model(model: &str) -> Arc<dyn TokenCounter> {
    match TiktokenCounter::for_model(model) {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!(model, error = %e, "Falling back to heuristic token counting");
            Arc::new(HeuristicCounter)
        }
    }
}
