//! Approximate token counting

/// Trait for counting tokens in text.
///
/// Implementations can wrap a real tokenizer; the benchmark only needs a
/// count whenever the server does not report an authoritative one.
pub trait TokenCounter: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count(&self, text: &str) -> usize;
}

/// Whitespace-based token counter.
///
/// Counts maximal runs of non-whitespace characters. This is a rough
/// approximation of model tokenization (often off by 2-4x) and is only
/// meant for relative comparisons between runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> usize {
        count_tokens(text)
    }
}

/// Count whitespace-delimited words in `text`.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
