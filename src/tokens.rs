//! Token counting.
//!
//! The scheduler only needs an integer count per text. Counting goes through
//! the [`TokenCounter`] trait so the tokenizer can be swapped, and so tests
//! can use a cheap deterministic counter.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{FailOpen, RefrainError, Result};

/// Supported encoding names.
pub const VALID_ENCODINGS: &[&str] = &["cl100k_base", "o200k_base", "heuristic"];

/// Counts tokens in text.
///
/// Implementations must be deterministic: the same text always yields the
/// same count, so a recorded consumption sequence can be replayed.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> u64;

    /// Short name for logs and status output.
    fn name(&self) -> &str;
}

impl<T: TokenCounter + ?Sized> TokenCounter for Arc<T> {
    fn count(&self, text: &str) -> u64 {
        (**self).count(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for Box<T> {
    fn count(&self, text: &str) -> u64 {
        (**self).count(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Exact counter backed by a tiktoken BPE.
pub struct TiktokenCounter {
    bpe: CoreBPE,
    encoding: &'static str,
}

impl TiktokenCounter {
    /// Load the `cl100k_base` encoding.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RefrainError::tokenizer(format!("cl100k_base: {}", e)))?;
        Ok(Self {
            bpe,
            encoding: "cl100k_base",
        })
    }

    /// Load the `o200k_base` encoding.
    pub fn o200k() -> Result<Self> {
        let bpe = tiktoken_rs::o200k_base()
            .map_err(|e| RefrainError::tokenizer(format!("o200k_base: {}", e)))?;
        Ok(Self {
            bpe,
            encoding: "o200k_base",
        })
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> u64 {
        self.bpe.encode_ordinary(text).len() as u64
    }

    fn name(&self) -> &str {
        self.encoding
    }
}

/// Approximate counter: one token per four characters, rounded up.
///
/// Used when no BPE can be loaded, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> u64 {
        let chars = text.chars().count() as u64;
        chars.div_ceil(4)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Check if an encoding name is supported.
pub fn is_valid_encoding(value: &str) -> bool {
    VALID_ENCODINGS.contains(&value)
}

/// Build the counter for an encoding name.
///
/// Falls back to [`HeuristicCounter`] with a warning if the BPE cannot be
/// loaded or the name is unknown.
pub fn counter_for(encoding: &str) -> Arc<dyn TokenCounter> {
    let loaded: Result<Arc<dyn TokenCounter>> = match encoding {
        "cl100k_base" => TiktokenCounter::cl100k().map(|c| Arc::new(c) as Arc<dyn TokenCounter>),
        "o200k_base" => TiktokenCounter::o200k().map(|c| Arc::new(c) as Arc<dyn TokenCounter>),
        "heuristic" => Ok(Arc::new(HeuristicCounter)),
        other => Err(RefrainError::tokenizer(format!(
            "unknown encoding '{}' (valid: {:?})",
            other, VALID_ENCODINGS
        ))),
    };

    loaded.fail_open_with("loading tokenizer", Arc::new(HeuristicCounter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_counts() {
        let counter = HeuristicCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("a"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
        assert_eq!(counter.name(), "heuristic");
    }

    #[test]
    fn test_heuristic_counts_chars_not_bytes() {
        // Four multi-byte characters
        assert_eq!(HeuristicCounter.count("éééé"), 1);
    }

    #[test]
    fn test_counter_for_heuristic() {
        let counter = counter_for("heuristic");
        assert_eq!(counter.name(), "heuristic");
    }

    #[test]
    fn test_counter_for_unknown_falls_back() {
        let counter = counter_for("made-up");
        assert_eq!(counter.name(), "heuristic");
        assert_eq!(counter.count("abcdefgh"), 2);
    }

    #[test]
    fn test_is_valid_encoding() {
        assert!(is_valid_encoding("cl100k_base"));
        assert!(is_valid_encoding("heuristic"));
        assert!(!is_valid_encoding("gpt2"));
    }

    #[test]
    fn test_tiktoken_is_deterministic() {
        let counter = TiktokenCounter::cl100k().unwrap();
        let text = "Always run the test suite before committing.";
        let first = counter.count(text);
        assert!(first > 0);
        assert_eq!(first, counter.count(text));
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.name(), "cl100k_base");
    }
}
