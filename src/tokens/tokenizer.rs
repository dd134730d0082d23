//! Tokenizer-backed counting from a Hugging Face `tokenizer.json`

use anyhow::{anyhow, Result};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use super::{HeuristicTokenCounter, TokenCounter};

/// Exact counts for the tokenizer's vocabulary
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
}

impl TokenizerCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
        debug!("Loaded tokenizer from {}", path.display());
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for TokenizerCounter {
    fn count(&self, text: &str, model: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                warn!("Tokenizer failed, using estimate: {}", e);
                HeuristicTokenCounter.count(text, model)
            }
        }
    }
}
