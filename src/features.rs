//! Token frequency vectors, the feature representation shared by every backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CodelangError, Result};
use crate::vocabulary::Vocabulary;

/// Sparse mapping from token to raw observed count for one source file.
///
/// Only observed tokens are stored; a missing key means zero. Counts are
/// always finite and non-negative. Normalization is left to the backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyVector {
    counts: HashMap<String, f64>,
}

impl FrequencyVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vector from `(token, count)` pairs.
    ///
    /// Repeated tokens are summed and zero counts are dropped. Negative or
    /// non-finite counts are rejected.
    pub fn from_counts<I, S>(counts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut vector = Self::new();
        for (token, count) in counts {
            let token = token.into();
            if !count.is_finite() || count < 0.0 {
                return Err(CodelangError::configuration(format!(
                    "invalid count {count} for token {token:?}"
                )));
            }
            vector.add(token, count);
        }
        Ok(vector)
    }

    /// Add `count` occurrences of `token`.
    ///
    /// Non-positive and non-finite counts are ignored.
    pub fn add<S: Into<String>>(&mut self, token: S, count: f64) {
        if count > 0.0 && count.is_finite() {
            *self.counts.entry(token.into()).or_insert(0.0) += count;
        }
    }

    /// Record one occurrence of `token`.
    pub fn increment(&mut self, token: &str) {
        match self.counts.get_mut(token) {
            Some(count) => *count += 1.0,
            None => {
                self.counts.insert(token.to_string(), 1.0);
            }
        }
    }

    /// Count for `token`, zero when absent.
    pub fn get(&self, token: &str) -> f64 {
        self.counts.get(token).copied().unwrap_or(0.0)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no token was observed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> f64 {
        self.counts.values().sum()
    }

    /// Iterate over `(token, count)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.counts.iter().map(|(token, &count)| (token.as_str(), count))
    }

    /// Iterate over observed tokens in unspecified order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Keep only the tokens that belong to `vocabulary`.
    pub fn retain_tokens(&self, vocabulary: &Vocabulary) -> FrequencyVector {
        let counts = self
            .counts
            .iter()
            .filter(|(token, _)| vocabulary.contains(token))
            .map(|(token, &count)| (token.clone(), count))
            .collect();
        FrequencyVector { counts }
    }

    /// Length-normalized copy: every count divided by the total.
    ///
    /// An empty vector stays empty.
    pub fn normalized(&self) -> FrequencyVector {
        let total = self.total();
        if total <= 0.0 {
            return FrequencyVector::new();
        }
        let counts = self
            .counts
            .iter()
            .map(|(token, &count)| (token.clone(), count / total))
            .collect();
        FrequencyVector { counts }
    }
}

impl FromIterator<(String, f64)> for FrequencyVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut vector = FrequencyVector::new();
        for (token, count) in iter {
            vector.add(token, count);
        }
        vector
    }
}
