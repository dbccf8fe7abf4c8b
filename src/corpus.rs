//! Labeled training corpora.
//!
//! A [`SampleCorpus`] maps each language name to the frequency vectors of
//! its sample files. Languages are kept in lexicographic order, which makes
//! every computation over the corpus deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::tokenizer::Tokenizer;
use crate::vocabulary::Vocabulary;

/// Mapping from language label to the frequency vectors of its samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleCorpus {
    languages: BTreeMap<String, Vec<FrequencyVector>>,
}

impl SampleCorpus {
    /// Create an empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from a map, rejecting languages without samples.
    pub fn from_map(languages: BTreeMap<String, Vec<FrequencyVector>>) -> Result<Self> {
        if let Some((language, _)) = languages.iter().find(|(_, samples)| samples.is_empty()) {
            return Err(CodelangError::configuration(format!(
                "language {language:?} has no samples"
            )));
        }
        Ok(SampleCorpus { languages })
    }

    /// Add one sample of `language`.
    pub fn add_sample<S: Into<String>>(&mut self, language: S, sample: FrequencyVector) {
        self.languages
            .entry(language.into())
            .or_default()
            .push(sample);
    }

    /// Number of languages.
    pub fn num_languages(&self) -> usize {
        self.languages.len()
    }

    /// Total number of samples over all languages.
    pub fn num_samples(&self) -> usize {
        self.languages.values().map(Vec::len).sum()
    }

    /// Whether the corpus holds no language.
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Language labels in sorted order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    /// Samples of `language`.
    pub fn samples(&self, language: &str) -> Option<&[FrequencyVector]> {
        self.languages.get(language).map(Vec::as_slice)
    }

    /// Iterate over `(language, samples)` in sorted language order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FrequencyVector])> {
        self.languages
            .iter()
            .map(|(language, samples)| (language.as_str(), samples.as_slice()))
    }

    /// Every token observed in any sample, sorted.
    pub fn distinct_tokens(&self) -> BTreeSet<&str> {
        self.languages
            .values()
            .flatten()
            .flat_map(FrequencyVector::tokens)
            .collect()
    }

    /// Check the corpus can be trained on: at least one language, and at
    /// least one sample for every language.
    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(CodelangError::configuration("sample corpus is empty"));
        }
        if let Some((language, _)) = self.languages.iter().find(|(_, s)| s.is_empty()) {
            return Err(CodelangError::configuration(format!(
                "language {language:?} has no samples"
            )));
        }
        Ok(())
    }

    /// Reduce every sample to the tokens of `vocabulary`.
    pub fn reduce(&self, vocabulary: &Vocabulary) -> SampleCorpus {
        let languages = self
            .languages
            .iter()
            .map(|(language, samples)| {
                let reduced = samples
                    .iter()
                    .map(|sample| sample.retain_tokens(vocabulary))
                    .collect();
                (language.clone(), reduced)
            })
            .collect();
        SampleCorpus { languages }
    }

    /// Load a corpus from a sample directory.
    ///
    /// Every immediate subdirectory of `dir` names a language; every regular
    /// file beneath it (recursively) is one sample. Hidden entries are
    /// skipped, as are files that produce no tokens.
    pub fn load_dir<P: AsRef<Path>>(dir: P, tokenizer: &dyn Tokenizer) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CodelangError::configuration(format!(
                "sample directory not found: {}",
                dir.display()
            )));
        }

        let mut corpus = SampleCorpus::new();
        for entry in sorted_entries(dir)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let language = entry.file_name().to_string_lossy().to_string();

            let mut samples = Vec::new();
            collect_samples(&path, tokenizer, &mut samples)?;
            if samples.is_empty() {
                warn!("Skipping language {language}: no usable samples");
                continue;
            }
            debug!("Loaded {} samples for {language}", samples.len());
            corpus.languages.insert(language, samples);
        }

        if corpus.is_empty() {
            return Err(CodelangError::configuration(format!(
                "no samples found in {}",
                dir.display()
            )));
        }
        Ok(corpus)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn collect_samples(
    dir: &Path,
    tokenizer: &dyn Tokenizer,
    samples: &mut Vec<FrequencyVector>,
) -> Result<()> {
    for entry in sorted_entries(dir)? {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_samples(&path, tokenizer, samples)?;
        } else if file_type.is_file() {
            let bytes = fs::read(&path)?;
            let vector = tokenizer.count(&String::from_utf8_lossy(&bytes));
            if vector.is_empty() {
                debug!("Skipping {}: no tokens", path.display());
                continue;
            }
            samples.push(vector);
        }
    }
    Ok(())
}
