//! The classifier contract and the closed registry of backends.
//!
//! Every trained model implements [`Classifier`]. The five algorithm
//! families are the variants of [`Backend`]; each variant knows how to train
//! its model from a [`SampleCorpus`] and how to decode it from bytes.
//!
//! # Example
//!
//! ```
//! use codelang::classifier::Backend;
//! use codelang::config::TrainingConfig;
//! use codelang::corpus::SampleCorpus;
//! use codelang::features::FrequencyVector;
//!
//! # fn main() -> codelang::error::Result<()> {
//! let mut corpus = SampleCorpus::new();
//! corpus.add_sample("go", FrequencyVector::from_counts([("func", 9.0), ("def", 1.0)])?);
//! corpus.add_sample("python", FrequencyVector::from_counts([("def", 9.0), ("func", 1.0)])?);
//!
//! let config = TrainingConfig::default();
//! let model = Backend::GaussBayes.train(&corpus, &config)?;
//! let restored = Backend::GaussBayes.decode(&model.encode())?;
//!
//! let query = FrequencyVector::from_counts([("func", 4.0)])?;
//! assert_eq!(model.classify(&query), "go");
//! assert_eq!(restored.classify(&query), "go");
//! # Ok(())
//! # }
//! ```

pub mod gaussbayes;
pub mod idtree;
pub mod knn;
pub mod neuralnet;
pub mod svm;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{MAGIC_LEN, ModelReader, ModelWriter};
use crate::config::TrainingConfig;
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub use gaussbayes::GaussBayesClassifier;
pub use idtree::IdTreeClassifier;
pub use knn::KnnClassifier;
pub use neuralnet::NeuralNetClassifier;
pub use svm::SvmClassifier;

/// A trained, immutable language classifier.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Classify a frequency vector.
    ///
    /// Tokens outside the model's vocabulary are ignored. The result is
    /// always one of [`Classifier::labels`], including for an empty vector.
    fn classify(&self, vector: &FrequencyVector) -> &str;

    /// Every label [`Classifier::classify`] may return. Never empty.
    fn labels(&self) -> &[String];

    /// Serialize every parameter of this model.
    ///
    /// The bytes decode with [`Backend::decode`] for [`Classifier::backend`].
    fn encode(&self) -> Vec<u8>;

    /// The backend that produced this model.
    fn backend(&self) -> Backend;

    /// The feature basis of this model.
    fn vocabulary(&self) -> &Vocabulary;
}

/// The closed set of classifier backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Decision tree grown with ID3.
    IdTree,
    /// Feedforward neural network.
    NeuralNet,
    /// K-nearest neighbors.
    Knn,
    /// Linear support vector machines, one-vs-rest.
    Svm,
    /// Naive Bayes with per-token Gaussians.
    GaussBayes,
}

impl Backend {
    /// Every backend, in registry order.
    pub const ALL: [Backend; 5] = [
        Backend::IdTree,
        Backend::NeuralNet,
        Backend::Knn,
        Backend::Svm,
        Backend::GaussBayes,
    ];

    /// Identifier of this backend.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::IdTree => "idtree",
            Backend::NeuralNet => "neuralnet",
            Backend::Knn => "knn",
            Backend::Svm => "svm",
            Backend::GaussBayes => "gaussbayes",
        }
    }

    /// One-line description of this backend.
    pub fn description(&self) -> &'static str {
        match self {
            Backend::IdTree => "decision trees generated with ID3",
            Backend::NeuralNet => "feedforward neural network",
            Backend::Knn => "K-nearest neighbors",
            Backend::Svm => "support vector machines",
            Backend::GaussBayes => "naive Bayes with Gaussians",
        }
    }

    /// Magic tag that starts every model encoded by this backend.
    pub fn magic(&self) -> &'static [u8; MAGIC_LEN] {
        match self {
            Backend::IdTree => idtree::MAGIC,
            Backend::NeuralNet => neuralnet::MAGIC,
            Backend::Knn => knn::MAGIC,
            Backend::Svm => svm::MAGIC,
            Backend::GaussBayes => gaussbayes::MAGIC,
        }
    }

    /// Find the backend whose magic tag starts `data`.
    pub fn from_magic(data: &[u8]) -> Option<Backend> {
        let magic = data.get(..MAGIC_LEN)?;
        Backend::ALL
            .into_iter()
            .find(|backend| backend.magic().as_slice() == magic)
    }

    /// Train a classifier of this kind on `corpus`.
    pub fn train(
        &self,
        corpus: &SampleCorpus,
        config: &TrainingConfig,
    ) -> Result<Box<dyn Classifier>> {
        Ok(match self {
            Backend::IdTree => Box::new(IdTreeClassifier::train(corpus, &config.idtree)?),
            Backend::NeuralNet => Box::new(NeuralNetClassifier::train(corpus, &config.neuralnet)?),
            Backend::Knn => Box::new(KnnClassifier::train(corpus, &config.knn)?),
            Backend::Svm => Box::new(SvmClassifier::train(corpus, &config.svm)?),
            Backend::GaussBayes => {
                Box::new(GaussBayesClassifier::train(corpus, &config.gaussbayes)?)
            }
        })
    }

    /// Decode a classifier of this kind.
    pub fn decode(&self, data: &[u8]) -> Result<Box<dyn Classifier>> {
        Ok(match self {
            Backend::IdTree => Box::new(IdTreeClassifier::decode(data)?),
            Backend::NeuralNet => Box::new(NeuralNetClassifier::decode(data)?),
            Backend::Knn => Box::new(KnnClassifier::decode(data)?),
            Backend::Svm => Box::new(SvmClassifier::decode(data)?),
            Backend::GaussBayes => Box::new(GaussBayesClassifier::decode(data)?),
        })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = CodelangError;

    fn from_str(s: &str) -> Result<Self> {
        Backend::ALL
            .into_iter()
            .find(|backend| backend.name() == s)
            .ok_or_else(|| CodelangError::configuration(format!("unknown backend: {s}")))
    }
}

/// Decode a classifier of any backend, chosen by its magic tag.
pub fn decode(data: &[u8]) -> Result<Box<dyn Classifier>> {
    let backend = Backend::from_magic(data)
        .ok_or_else(|| CodelangError::decode("unrecognized model magic"))?;
    backend.decode(data)
}

/// Dense view of a corpus shared by the backend trainers.
#[derive(Debug, Clone)]
pub(crate) struct TrainingSet {
    pub vocabulary: Vocabulary,
    pub labels: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<usize>,
}

impl TrainingSet {
    /// Project every sample of `corpus` onto the corpus' own vocabulary.
    pub fn new(corpus: &SampleCorpus) -> Result<Self> {
        corpus.validate()?;
        let vocabulary = Vocabulary::from_corpus(corpus);
        let mut labels = Vec::with_capacity(corpus.num_languages());
        let mut rows = Vec::with_capacity(corpus.num_samples());
        let mut targets = Vec::with_capacity(corpus.num_samples());

        for (label_idx, (language, samples)) in corpus.iter().enumerate() {
            labels.push(language.to_string());
            for sample in samples {
                rows.push(vocabulary.project(sample));
                targets.push(label_idx);
            }
        }

        Ok(TrainingSet {
            vocabulary,
            labels,
            rows,
            targets,
        })
    }

    pub fn num_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of samples of every label.
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.len()];
        for &target in &self.targets {
            counts[target] += 1;
        }
        counts
    }
}

/// Index of the largest score; ties go to the lowest index and NaN never wins.
pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, &score) in scores.iter().enumerate() {
        let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

/// Write the label list and vocabulary every model body starts with.
pub(crate) fn write_common(writer: &mut ModelWriter, labels: &[String], vocabulary: &Vocabulary) {
    writer.write_strings(labels);
    vocabulary.write_to(writer);
}

/// Read and check the label list and vocabulary.
pub(crate) fn read_common(reader: &mut ModelReader<'_>) -> Result<(Vec<String>, Vocabulary)> {
    let labels = reader.read_strings()?;
    if labels.is_empty() {
        return Err(CodelangError::decode("model has no labels"));
    }
    let mut seen = HashSet::with_capacity(labels.len());
    for label in &labels {
        if !seen.insert(label.as_str()) {
            return Err(CodelangError::decode(format!("duplicate label {label:?}")));
        }
    }
    let vocabulary = Vocabulary::read_from(reader)?;
    Ok((labels, vocabulary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
            assert_eq!(Backend::from_magic(backend.magic()), Some(backend));
            assert!(!backend.description().is_empty());
        }
        assert!("perceptron".parse::<Backend>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_magic_tags_are_distinct() {
        let magics: HashSet<_> = Backend::ALL.iter().map(|b| b.magic()).collect();
        assert_eq!(magics.len(), Backend::ALL.len());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Backend::ALL).unwrap();
        assert_eq!(json, r#"["idtree","neuralnet","knn","svm","gaussbayes"]"#);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[f64::NAN, -1.0]), 1);
        assert_eq!(argmax(&[f64::NAN]), 0);
        assert_eq!(argmax(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), 0);
    }

    #[test]
    fn test_decode_unknown_magic() {
        assert!(decode(b"XXXX\x01\x00\x00\x00\x00\x00").unwrap_err().is_decode());
        assert!(decode(b"").unwrap_err().is_decode());
    }

    #[test]
    fn test_training_set() {
        let mut corpus = SampleCorpus::new();
        corpus.add_sample("python", FrequencyVector::from_counts([("def", 3.0)]).unwrap());
        corpus.add_sample("go", FrequencyVector::from_counts([("func", 1.0)]).unwrap());
        corpus.add_sample("go", FrequencyVector::new());

        let set = TrainingSet::new(&corpus).unwrap();
        assert_eq!(set.labels, vec!["go", "python"]);
        assert_eq!(set.vocabulary.tokens(), &["def".to_string(), "func".to_string()]);
        assert_eq!(set.rows, vec![vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, 0.0]]);
        assert_eq!(set.targets, vec![0, 0, 1]);
        assert_eq!(set.label_counts(), vec![2, 1]);
    }
}
