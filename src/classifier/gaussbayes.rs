//! Naive Bayes classifier with one Gaussian per label and token.

use std::f64::consts::PI;

use crate::classifier::{Backend, Classifier, TrainingSet, argmax, read_common, write_common};
use crate::codec::{ModelReader, ModelWriter};
use crate::config::{GaussBayesConfig, Prior};
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"CLGB";
const VERSION: u16 = 1;

/// Per-label distribution of every normalized token frequency.
#[derive(Debug, Clone, PartialEq)]
struct LabelModel {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl LabelModel {
    fn log_likelihood(&self, features: &[f64]) -> f64 {
        let mut total = self.log_prior;
        for ((x, mean), var) in features.iter().zip(&self.means).zip(&self.variances) {
            let diff = x - mean;
            total -= 0.5 * (2.0 * PI * var).ln() + diff * diff / (2.0 * var);
        }
        total
    }

    fn is_finite(&self) -> bool {
        self.log_prior.is_finite()
            && self.means.iter().chain(&self.variances).all(|v| v.is_finite())
    }
}

/// Gaussian naive Bayes classifier.
#[derive(Debug, Clone)]
pub struct GaussBayesClassifier {
    labels: Vec<String>,
    vocabulary: Vocabulary,
    models: Vec<LabelModel>,
}

impl GaussBayesClassifier {
    /// Estimate per-label means and variances from `corpus`.
    pub fn train(corpus: &SampleCorpus, config: &GaussBayesConfig) -> Result<Self> {
        config.validate()?;
        let set = TrainingSet::new(corpus)?;
        let dims = set.num_features();
        let counts = set.label_counts();
        let total = set.rows.len() as f64;

        let mut models = Vec::with_capacity(set.num_labels());
        for (label, &count) in counts.iter().enumerate() {
            let members: Vec<&Vec<f64>> = set
                .rows
                .iter()
                .zip(&set.targets)
                .filter(|(_, t)| **t == label)
                .map(|(row, _)| row)
                .collect();
            let n = count as f64;

            let mut means = vec![0.0; dims];
            for row in &members {
                for (m, x) in means.iter_mut().zip(row.iter()) {
                    *m += x;
                }
            }
            means.iter_mut().for_each(|m| *m /= n);

            let mut variances = vec![0.0; dims];
            for row in &members {
                for ((v, x), m) in variances.iter_mut().zip(row.iter()).zip(&means) {
                    *v += (x - m) * (x - m);
                }
            }
            variances
                .iter_mut()
                .for_each(|v| *v = (*v / n).max(config.variance_floor));

            let log_prior = match config.prior {
                Prior::Uniform => -(set.num_labels() as f64).ln(),
                Prior::Frequency => (n / total).ln(),
            };

            let model = LabelModel {
                log_prior,
                means,
                variances,
            };
            if !model.is_finite() {
                return Err(CodelangError::training(
                    Backend::GaussBayes,
                    format!("non-finite parameters for {}", set.labels[label]),
                ));
            }
            models.push(model);
        }

        Ok(GaussBayesClassifier {
            labels: set.labels,
            vocabulary: set.vocabulary,
            models,
        })
    }

    /// Decode a model written by [`Classifier::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ModelReader::open(data, MAGIC, VERSION)?;
        let (labels, vocabulary) = read_common(&mut reader)?;
        let mut models = Vec::with_capacity(labels.len());
        for _ in 0..labels.len() {
            let log_prior = reader.read_finite_f64()?;
            let means = reader.read_f64s_exact(vocabulary.len(), "means")?;
            let variances = reader.read_f64s_exact(vocabulary.len(), "variances")?;
            if variances.iter().any(|&v| v <= 0.0) {
                return Err(CodelangError::decode("variance must be positive"));
            }
            models.push(LabelModel {
                log_prior,
                means,
                variances,
            });
        }
        reader.finish()?;
        Ok(GaussBayesClassifier {
            labels,
            vocabulary,
            models,
        })
    }

    /// Log posterior (up to a shared constant) of every label for `vector`.
    pub fn scores(&self, vector: &FrequencyVector) -> Vec<f64> {
        let features = self.vocabulary.project(vector);
        self.models
            .iter()
            .map(|m| m.log_likelihood(&features))
            .collect()
    }
}

impl Classifier for GaussBayesClassifier {
    fn classify(&self, vector: &FrequencyVector) -> &str {
        &self.labels[argmax(&self.scores(vector))]
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, VERSION);
        write_common(&mut writer, &self.labels, &self.vocabulary);
        for model in &self.models {
            writer.write_f64(model.log_prior);
            writer.write_f64s(&model.means);
            writer.write_f64s(&model.variances);
        }
        writer.finish()
    }

    fn backend(&self) -> Backend {
        Backend::GaussBayes
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}
