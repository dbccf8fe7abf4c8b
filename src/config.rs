//! Configuration for training runs and backend hyperparameters.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::Backend;
use crate::distance::DistanceMetric;
use crate::error::{CodelangError, Result};

/// Configuration for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Backends to train, in report order.
    pub backends: Vec<Backend>,

    /// Thread pool size for parallel training.
    /// If None, uses the number of CPU cores.
    pub threads: Option<usize>,

    /// Decision tree hyperparameters.
    pub idtree: IdTreeConfig,

    /// Neural network hyperparameters.
    pub neuralnet: NeuralNetConfig,

    /// Nearest neighbor hyperparameters.
    pub knn: KnnConfig,

    /// Support vector machine hyperparameters.
    pub svm: SvmConfig,

    /// Gaussian naive Bayes hyperparameters.
    pub gaussbayes: GaussBayesConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            backends: Backend::ALL.to_vec(),
            threads: None,
            idtree: IdTreeConfig::default(),
            neuralnet: NeuralNetConfig::default(),
            knn: KnnConfig::default(),
            svm: SvmConfig::default(),
            gaussbayes: GaussBayesConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: TrainingConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Restrict training to the given backends.
    pub fn with_backends(mut self, backends: Vec<Backend>) -> Self {
        self.backends = backends;
        self
    }

    /// Set the thread pool size.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Check every hyperparameter.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(CodelangError::configuration("no backend selected"));
        }
        for (i, backend) in self.backends.iter().enumerate() {
            if self.backends[..i].contains(backend) {
                return Err(CodelangError::configuration(format!(
                    "backend {backend} selected twice"
                )));
            }
        }
        if self.threads == Some(0) {
            return Err(CodelangError::configuration("threads must be at least 1"));
        }
        self.idtree.validate()?;
        self.neuralnet.validate()?;
        self.knn.validate()?;
        self.svm.validate()?;
        self.gaussbayes.validate()
    }
}

/// Deepest decision tree a model may encode.
pub const MAX_TREE_DEPTH: usize = 1024;

/// Decision tree hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdTreeConfig {
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
}

impl Default for IdTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            min_samples_split: 2,
        }
    }
}

impl IdTreeConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_depth > MAX_TREE_DEPTH {
            return Err(CodelangError::configuration(format!(
                "idtree.max_depth must be at most {MAX_TREE_DEPTH}"
            )));
        }
        if self.min_samples_split < 2 {
            return Err(CodelangError::configuration(
                "idtree.min_samples_split must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Feedforward network hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralNetConfig {
    /// Number of hidden units.
    pub hidden_units: usize,
    /// Number of passes over the training set.
    pub epochs: usize,
    /// SGD step size.
    pub learning_rate: f64,
    /// Seed for weight initialization and sample shuffling.
    pub seed: u64,
}

impl Default for NeuralNetConfig {
    fn default() -> Self {
        Self {
            hidden_units: 16,
            epochs: 500,
            learning_rate: 0.5,
            seed: 1,
        }
    }
}

impl NeuralNetConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.hidden_units == 0 {
            return Err(CodelangError::configuration(
                "neuralnet.hidden_units must be at least 1",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CodelangError::configuration(
                "neuralnet.learning_rate must be positive",
            ));
        }
        Ok(())
    }
}

/// Nearest neighbor hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Number of neighbors that vote.
    pub k: usize,
    /// Distance between normalized frequency vectors.
    pub metric: DistanceMetric,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k: 5,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl KnnConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(CodelangError::configuration("knn.k must be at least 1"));
        }
        Ok(())
    }
}

/// Linear support vector machine hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// Misclassification penalty.
    pub c: f64,
    /// Maximum passes of coordinate descent per label.
    pub max_passes: usize,
    /// Stopping tolerance on the projected gradient gap.
    pub tolerance: f64,
    /// Seed for the coordinate order.
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 10.0,
            max_passes: 1000,
            tolerance: 1e-3,
            seed: 1,
        }
    }
}

impl SvmConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(CodelangError::configuration("svm.c must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(CodelangError::configuration(
                "svm.tolerance must be positive",
            ));
        }
        Ok(())
    }
}

/// Class prior used by the Gaussian naive Bayes backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Prior {
    /// Every label equally likely.
    Uniform,
    /// Proportional to the number of training samples of each label.
    #[default]
    Frequency,
}

/// Gaussian naive Bayes hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussBayesConfig {
    /// Lower bound on every per-token variance.
    pub variance_floor: f64,
    /// Class prior.
    pub prior: Prior,
}

impl Default for GaussBayesConfig {
    fn default() -> Self {
        Self {
            variance_floor: 1e-4,
            prior: Prior::Frequency,
        }
    }
}

impl GaussBayesConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(CodelangError::configuration(
                "gaussbayes.variance_floor must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TrainingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.backends.len(), 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrainingConfig::default();
        config.knn.k = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = TrainingConfig::default();
        config.idtree.max_depth = MAX_TREE_DEPTH + 1;
        assert!(config.validate().unwrap_err().is_configuration());

        let config = TrainingConfig::default().with_backends(vec![Backend::Knn, Backend::Knn]);
        assert!(config.validate().is_err());

        let config = TrainingConfig::default().with_backends(Vec::new());
        assert!(config.validate().is_err());

        let config = TrainingConfig::default().with_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"backends": ["knn", "svm"], "knn": {"k": 3}}"#).unwrap();
        assert_eq!(config.backends, vec![Backend::Knn, Backend::Svm]);
        assert_eq!(config.knn.k, 3);
        assert_eq!(config.knn.metric, DistanceMetric::Cosine);
        assert_eq!(config.svm, SvmConfig::default());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"gaussbayes": {"prior": "uniform"}}"#).unwrap();
        let config = TrainingConfig::from_json_file(&path).unwrap();
        assert_eq!(config.gaussbayes.prior, Prior::Uniform);

        std::fs::write(&path, r#"{"neuralnet": {"hidden_units": 0}}"#).unwrap();
        assert!(TrainingConfig::from_json_file(&path).is_err());
    }
}
