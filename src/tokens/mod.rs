//! Token counting
//!
//! Estimates token counts when the transport does not report usage or when
//! consistent counting across providers is wanted.

#[cfg(feature = "tokenizer")]
mod tokenizer;

#[cfg(feature = "tokenizer")]
pub use tokenizer::TokenizerCounter;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::models::ChatMessage;

/// Tokens added per chat message for role/framing
const TOKENS_PER_MESSAGE: usize = 3;

/// Tokens priming the assistant reply
const REPLY_PRIMING_TOKENS: usize = 3;

/// Average characters per token for English-like text
const CHARS_PER_TOKEN: usize = 4;

/// Counts tokens in text for a given model
pub trait TokenCounter: Send + Sync {
    /// Count the tokens of a plain text
    fn count(&self, text: &str, model: &str) -> usize;

    /// Count the prompt tokens of a chat conversation, including framing
    fn count_chat(&self, messages: &[ChatMessage], model: &str) -> usize {
        if messages.is_empty() {
            return 0;
        }
        let content: usize = messages
            .iter()
            .map(|m| TOKENS_PER_MESSAGE + self.count(&m.content, model))
            .sum();
        content + REPLY_PRIMING_TOKENS
    }
}

/// Model-agnostic estimate: one token per four characters, never fewer
/// tokens than whitespace-separated words.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str, _model: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 {
            return 0;
        }
        let by_chars = chars.div_ceil(CHARS_PER_TOKEN);
        let words = text.split_whitespace().count();
        by_chars.max(words)
    }
}

/// Counter for a run: the tokenizer file when one is configured, otherwise
/// the character estimate
pub fn counter_for(tokenizer: Option<&Path>) -> Result<Arc<dyn TokenCounter>> {
    match tokenizer {
        None => Ok(Arc::new(HeuristicTokenCounter)),
        #[cfg(feature = "tokenizer")]
        Some(path) => Ok(Arc::new(TokenizerCounter::from_file(path)?)),
        #[cfg(not(feature = "tokenizer"))]
        Some(path) => anyhow::bail!(
            "Tokenizer {} is configured but llm-bench was built without the `tokenizer` feature",
            path.display()
        ),
    }
}
