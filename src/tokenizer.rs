//! Source text tokenization into frequency vectors.

use std::sync::Arc;

use regex::Regex;

use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;

/// Default token pattern: identifiers and keywords, or runs of one to three
/// symbol characters. Digits and whitespace never form tokens.
pub const DEFAULT_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*|[^\sA-Za-z0-9_]{1,3}";

/// Turns source text into token counts.
pub trait Tokenizer: Send + Sync {
    /// Count the tokens of `source`.
    fn count(&self, source: &str) -> FrequencyVector;

    /// Get the name of this tokenizer for debugging and logging.
    fn name(&self) -> &str;
}

/// A regex-based tokenizer counting every match of its pattern.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
}

impl RegexTokenizer {
    /// Create a tokenizer with [`DEFAULT_PATTERN`].
    pub fn new() -> Result<Self> {
        Self::with_pattern(DEFAULT_PATTERN)
    }

    /// Create a tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| CodelangError::configuration(format!("Invalid regex pattern: {e}")))?;

        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
        })
    }

    /// Get the regex pattern used by this tokenizer.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Tokenizer for RegexTokenizer {
    fn count(&self, source: &str) -> FrequencyVector {
        let mut vector = FrequencyVector::new();
        for mat in self.pattern.find_iter(source) {
            if !mat.as_str().is_empty() {
                vector.increment(mat.as_str());
            }
        }
        vector
    }

    fn name(&self) -> &str {
        "regex"
    }
}
