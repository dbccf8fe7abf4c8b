//! Linear support vector machine classifier, one-vs-rest.
//!
//! Every label gets a separating hyperplane fit with dual coordinate descent
//! on the L1-loss (hinge) SVM objective. The bias is learned as the weight of
//! an implicit constant feature. Classification picks the label whose
//! hyperplane scores the input highest.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::classifier::{Backend, Classifier, TrainingSet, argmax, read_common, write_common};
use crate::codec::{ModelReader, ModelWriter};
use crate::config::SvmConfig;
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"CLSV";
const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
struct Hyperplane {
    weights: Vec<f64>,
    bias: f64,
}

impl Hyperplane {
    fn score(&self, features: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

/// One-vs-rest linear SVM classifier.
#[derive(Debug, Clone)]
pub struct SvmClassifier {
    labels: Vec<String>,
    vocabulary: Vocabulary,
    planes: Vec<Hyperplane>,
}

impl SvmClassifier {
    /// Fit one hyperplane per label of `corpus`.
    pub fn train(corpus: &SampleCorpus, config: &SvmConfig) -> Result<Self> {
        config.validate()?;
        let set = TrainingSet::new(corpus)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut planes = Vec::with_capacity(set.num_labels());
        for label in 0..set.num_labels() {
            let signs: Vec<f64> = set
                .targets
                .iter()
                .map(|&t| if t == label { 1.0 } else { -1.0 })
                .collect();
            let (plane, passes) = fit_binary(&set.rows, &signs, config, &mut rng);
            if !plane.is_finite() {
                return Err(CodelangError::training(
                    Backend::Svm,
                    format!("hyperplane for {} has non-finite weights", set.labels[label]),
                ));
            }
            debug!(
                "Fit hyperplane for {} in {passes} passes",
                set.labels[label]
            );
            planes.push(plane);
        }

        Ok(SvmClassifier {
            labels: set.labels,
            vocabulary: set.vocabulary,
            planes,
        })
    }

    /// Decode a model written by [`Classifier::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ModelReader::open(data, MAGIC, VERSION)?;
        let (labels, vocabulary) = read_common(&mut reader)?;
        let mut planes = Vec::with_capacity(labels.len());
        for _ in 0..labels.len() {
            let weights = reader.read_f64s_exact(vocabulary.len(), "hyperplane weights")?;
            let bias = reader.read_finite_f64()?;
            planes.push(Hyperplane { weights, bias });
        }
        reader.finish()?;
        Ok(SvmClassifier {
            labels,
            vocabulary,
            planes,
        })
    }

    /// Hyperplane score of every label for `vector`.
    pub fn scores(&self, vector: &FrequencyVector) -> Vec<f64> {
        let features = self.vocabulary.project(vector);
        self.planes.iter().map(|p| p.score(&features)).collect()
    }
}

impl Classifier for SvmClassifier {
    fn classify(&self, vector: &FrequencyVector) -> &str {
        &self.labels[argmax(&self.scores(vector))]
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, VERSION);
        write_common(&mut writer, &self.labels, &self.vocabulary);
        for plane in &self.planes {
            writer.write_f64s(&plane.weights);
            writer.write_f64(plane.bias);
        }
        writer.finish()
    }

    fn backend(&self) -> Backend {
        Backend::Svm
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Dual coordinate descent for one binary problem with labels in {-1, +1}.
///
/// Returns the hyperplane and the number of passes made.
fn fit_binary(
    rows: &[Vec<f64>],
    signs: &[f64],
    config: &SvmConfig,
    rng: &mut StdRng,
) -> (Hyperplane, usize) {
    let dims = rows.first().map_or(0, Vec::len);
    let mut plane = Hyperplane {
        weights: vec![0.0; dims],
        bias: 0.0,
    };
    let mut alphas = vec![0.0; rows.len()];
    // Diagonal of the kernel matrix, including the constant bias feature.
    let diag: Vec<f64> = rows
        .iter()
        .map(|row| 1.0 + row.iter().map(|x| x * x).sum::<f64>())
        .collect();

    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut passes = 0;
    while passes < config.max_passes {
        passes += 1;
        order.shuffle(rng);

        let mut max_pg = f64::NEG_INFINITY;
        let mut min_pg = f64::INFINITY;
        for &i in &order {
            let gradient = signs[i] * plane.score(&rows[i]) - 1.0;
            let projected = if alphas[i] <= 0.0 {
                gradient.min(0.0)
            } else if alphas[i] >= config.c {
                gradient.max(0.0)
            } else {
                gradient
            };
            max_pg = max_pg.max(projected);
            min_pg = min_pg.min(projected);

            if projected.abs() > 1e-12 {
                let old = alphas[i];
                alphas[i] = (old - gradient / diag[i]).clamp(0.0, config.c);
                let step = (alphas[i] - old) * signs[i];
                for (w, x) in plane.weights.iter_mut().zip(&rows[i]) {
                    *w += step * x;
                }
                plane.bias += step;
            }
        }

        if max_pg - min_pg < config.tolerance {
            break;
        }
    }

    (plane, passes)
}
