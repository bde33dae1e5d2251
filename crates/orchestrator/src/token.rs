//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text, which is plenty for a context budget that exists to keep prompts
//! bounded rather than to bill them.

use riskpilot_core::message::Message;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Per-message overhead for role name, delimiters, and wire formatting.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Estimate tokens for a raw text treated as one message.
pub fn estimate_text_message_tokens(text: &str) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(text)
}
