//! Vocabulary selection.
//!
//! A [`Vocabulary`] is the ordered feature basis every backend of a training
//! run projects its inputs onto. [`VocabularySelector`] picks at most K
//! tokens from a [`SampleCorpus`], scoring each token by how unevenly its
//! average frequency is spread over the languages.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::codec::{ModelReader, ModelWriter};
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;

/// Ordered set of tokens used as the feature basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Create a vocabulary from distinct tokens, keeping their order.
    pub fn new(tokens: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            if index.insert(token.clone(), i).is_some() {
                return Err(CodelangError::configuration(format!(
                    "duplicate vocabulary token {token:?}"
                )));
            }
        }
        Ok(Vocabulary { tokens, index })
    }

    /// Every token observed in `corpus`, sorted lexicographically.
    pub fn from_corpus(corpus: &SampleCorpus) -> Self {
        let tokens = corpus
            .distinct_tokens()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self::from_distinct(tokens)
    }

    fn from_distinct(tokens: Vec<String>) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i))
            .collect();
        Vocabulary { tokens, index }
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in feature order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Whether `token` is part of the vocabulary.
    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Feature index of `token`.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// Project `vector` onto this vocabulary as a dense, length-normalized
    /// feature vector.
    ///
    /// Tokens outside the vocabulary are ignored, including for the
    /// normalizer. A vector with no vocabulary token projects to all zeros.
    pub fn project(&self, vector: &FrequencyVector) -> Vec<f64> {
        let mut dense = vec![0.0; self.tokens.len()];
        for (token, count) in vector.iter() {
            if let Some(i) = self.index_of(token) {
                dense[i] = count;
            }
        }

        // Summed in feature order so the result does not depend on map order.
        let total: f64 = dense.iter().sum();
        if total > 0.0 {
            for value in &mut dense {
                *value /= total;
            }
        }
        dense
    }

    pub(crate) fn write_to(&self, writer: &mut ModelWriter) {
        writer.write_strings(&self.tokens);
    }

    pub(crate) fn read_from(reader: &mut ModelReader<'_>) -> Result<Self> {
        let tokens = reader.read_strings()?;
        Vocabulary::new(tokens).map_err(|e| CodelangError::decode(e.to_string()))
    }
}

/// Selects the K most discriminative tokens of a corpus.
#[derive(Debug, Clone, Copy)]
pub struct VocabularySelector {
    max_size: usize,
}

impl VocabularySelector {
    /// Create a selector keeping at most `max_size` tokens.
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(CodelangError::configuration(
                "maximum vocabulary size must be at least 1",
            ));
        }
        Ok(VocabularySelector { max_size })
    }

    /// Maximum number of tokens this selector keeps.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Select the vocabulary for `corpus`.
    ///
    /// Tokens are ranked by the variance of their per-language mean
    /// frequency, then by overall mean frequency, then lexicographically.
    pub fn select(&self, corpus: &SampleCorpus) -> Vocabulary {
        let mut scored: Vec<TokenScore<'_>> = score_tokens(corpus);
        scored.sort_by(TokenScore::ranking);
        scored.truncate(self.max_size);

        // Scores are computed per distinct token.
        Vocabulary::from_distinct(scored.into_iter().map(|s| s.token.to_string()).collect())
    }
}

#[derive(Debug)]
struct TokenScore<'a> {
    token: &'a str,
    variance: f64,
    mean: f64,
}

impl TokenScore<'_> {
    fn ranking(a: &TokenScore<'_>, b: &TokenScore<'_>) -> Ordering {
        b.variance
            .total_cmp(&a.variance)
            .then_with(|| b.mean.total_cmp(&a.mean))
            .then_with(|| a.token.cmp(b.token))
    }
}

fn score_tokens(corpus: &SampleCorpus) -> Vec<TokenScore<'_>> {
    let tokens = corpus.distinct_tokens();
    let num_languages = corpus.num_languages();
    if num_languages == 0 {
        return Vec::new();
    }

    // Per-language mean of the length-normalized frequency of every token.
    let mut means: BTreeMap<&str, Vec<f64>> =
        tokens.iter().map(|&t| (t, vec![0.0; num_languages])).collect();
    for (lang_idx, (_, samples)) in corpus.iter().enumerate() {
        let weight = 1.0 / samples.len() as f64;
        for sample in samples {
            let mut entries: Vec<(&str, f64)> = sample.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let total: f64 = entries.iter().map(|&(_, count)| count).sum();
            if total <= 0.0 {
                continue;
            }
            for (token, count) in entries {
                if let Some(row) = means.get_mut(token) {
                    row[lang_idx] += weight * count / total;
                }
            }
        }
    }

    means
        .into_iter()
        .map(|(token, row)| {
            let mean = row.iter().sum::<f64>() / num_languages as f64;
            let variance =
                row.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / num_languages as f64;
            TokenScore {
                token,
                variance,
                mean,
            }
        })
        .collect()
}
