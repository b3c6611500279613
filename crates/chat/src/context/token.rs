//! Token estimation and model limits.
//!
//! Window construction consumes a [`TokenCounter`]. The default
//! [`HeuristicTokenCounter`] uses ~4 characters per token, which is within
//! ~10% of BPE tokenizers on English text. Swap in an exact tokenizer by
//! implementing the trait.

use crate::error::ChatError;
use ragchat_core::message::Message;

/// Tokens charged for one image part.
pub const IMAGE_TOKENS: usize = 85;

/// Per-message overhead for role name, delimiters, and formatting markers.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Counts how many model tokens a message costs.
///
/// Must be deterministic and monotonic in content length.
pub trait TokenCounter: Send + Sync {
    fn count(&self, model: &str, message: &Message) -> usize;
}

/// Character-based estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, _model: &str, message: &Message) -> usize {
        MESSAGE_OVERHEAD
            + estimate_tokens(&message.text())
            + message.content.image_count() * IMAGE_TOKENS
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Context window size of a known model.
pub fn token_limit(model: &str) -> Result<usize, ChatError> {
    let limit = match model {
        "gpt-35-turbo" | "gpt-3.5-turbo" => 4000,
        "gpt-35-turbo-16k" | "gpt-3.5-turbo-16k" => 16000,
        "gpt-4" => 8100,
        "gpt-4-32k" => 32000,
        "gpt-4v" | "gpt-4o" => 128000,
        other => return Err(ChatError::UnknownModel(other.to_string())),
    };
    Ok(limit)
}
