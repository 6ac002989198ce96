/*
 * Token estimates shown next to each export segment. `TokenCounterOperations`
 * abstracts the strategy; `CoreTikTokenCounter` uses the `cl100k_base`
 * encoding from `tiktoken-rs`, and `SimpleWhitespaceTokenCounter` is the cheap
 * word-count fallback.
 */
use tiktoken_rs::{CoreBPE, cl100k_base};

pub trait TokenCounterOperations: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/*
 * Counts tokens with `cl100k_base`. The encoder is built once on construction;
 * if that fails the error is logged and whitespace counting is used instead.
 */
pub struct CoreTikTokenCounter {
    bpe: Option<CoreBPE>,
}

impl CoreTikTokenCounter {
    pub fn new() -> Self {
        let bpe = match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                log::error!(
                    "TokenCounter: Failed to initialize cl100k_base: {e:?}. Falling back to whitespace token count."
                );
                None
            }
        };
        CoreTikTokenCounter { bpe }
    }
}

impl Default for CoreTikTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for CoreTikTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.split_whitespace().count(),
        }
    }
}

pub struct SimpleWhitespaceTokenCounter;

impl SimpleWhitespaceTokenCounter {
    pub fn new() -> Self {
        SimpleWhitespaceTokenCounter
    }
}

impl Default for SimpleWhitespaceTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for SimpleWhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
