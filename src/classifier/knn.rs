//! K-nearest neighbor classifier.

use std::cmp::Ordering;

use crate::classifier::{Backend, Classifier, TrainingSet, argmax, read_common, write_common};
use crate::codec::{ModelReader, ModelWriter};
use crate::config::KnnConfig;
use crate::corpus::SampleCorpus;
use crate::distance::DistanceMetric;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"CLKN";
const VERSION: u16 = 1;

/// Nearest neighbor classifier over the stored, normalized training set.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    labels: Vec<String>,
    vocabulary: Vocabulary,
    k: usize,
    metric: DistanceMetric,
    rows: Vec<Vec<f64>>,
    targets: Vec<usize>,
}

impl KnnClassifier {
    /// Store `corpus` for neighbor search.
    pub fn train(corpus: &SampleCorpus, config: &KnnConfig) -> Result<Self> {
        config.validate()?;
        let set = TrainingSet::new(corpus)?;
        Ok(KnnClassifier {
            labels: set.labels,
            vocabulary: set.vocabulary,
            k: config.k,
            metric: config.metric,
            rows: set.rows,
            targets: set.targets,
        })
    }

    /// Decode a model written by [`Classifier::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ModelReader::open(data, MAGIC, VERSION)?;
        let (labels, vocabulary) = read_common(&mut reader)?;
        let k = reader.read_varint()? as usize;
        if k == 0 {
            return Err(CodelangError::decode("knn k must be at least 1"));
        }
        let metric = DistanceMetric::from_tag(reader.read_u8()?)?;

        let count = reader.read_len(1)?;
        if count == 0 {
            return Err(CodelangError::decode("knn model stores no samples"));
        }
        let mut rows = Vec::with_capacity(count);
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            let target = reader.read_varint()? as usize;
            if target >= labels.len() {
                return Err(CodelangError::decode(format!(
                    "sample label {target} out of range"
                )));
            }
            targets.push(target);
            rows.push(reader.read_f64s_exact(vocabulary.len(), "knn sample")?);
        }
        reader.finish()?;

        Ok(KnnClassifier {
            labels,
            vocabulary,
            k,
            metric,
            rows,
            targets,
        })
    }

    /// Number of neighbors that vote.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Distance metric used for neighbor search.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Indices of the stored samples closest to `features`, nearest first.
    fn neighbors(&self, features: &[f64]) -> Vec<usize> {
        let mut distances: Vec<(f64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (self.metric.distance(features, row), i))
            .collect();
        distances.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });
        distances
            .into_iter()
            .take(self.k.min(self.rows.len()))
            .map(|(_, i)| i)
            .collect()
    }
}

impl Classifier for KnnClassifier {
    fn classify(&self, vector: &FrequencyVector) -> &str {
        let features = self.vocabulary.project(vector);
        let neighbors = self.neighbors(&features);

        // Votes with a small bonus for rank, so that vote ties go to the
        // label whose nearest member ranks first.
        let mut votes = vec![0.0; self.labels.len()];
        let mut first_rank = vec![usize::MAX; self.labels.len()];
        for (rank, &i) in neighbors.iter().enumerate() {
            let label = self.targets[i];
            votes[label] += 1.0;
            first_rank[label] = first_rank[label].min(rank);
        }
        let scores: Vec<f64> = votes
            .iter()
            .zip(&first_rank)
            .map(|(&v, &r)| {
                if r == usize::MAX {
                    f64::NEG_INFINITY
                } else {
                    v - r as f64 / (neighbors.len() as f64 + 1.0)
                }
            })
            .collect();
        &self.labels[argmax(&scores)]
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, VERSION);
        write_common(&mut writer, &self.labels, &self.vocabulary);
        writer.write_len(self.k);
        writer.write_u8(self.metric.tag());
        writer.write_len(self.rows.len());
        for (row, &target) in self.rows.iter().zip(&self.targets) {
            writer.write_len(target);
            writer.write_f64s(row);
        }
        writer.finish()
    }

    fn backend(&self) -> Backend {
        Backend::Knn
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> FrequencyVector {
        FrequencyVector::from_counts(pairs.iter().map(|&(t, c)| (t, c))).unwrap()
    }

    fn corpus() -> SampleCorpus {
        let mut corpus = SampleCorpus::new();
        corpus.add_sample("go", vector(&[("func", 9.0), ("def", 1.0)]));
        corpus.add_sample("go", vector(&[("func", 7.0), ("def", 2.0)]));
        corpus.add_sample("python", vector(&[("def", 9.0), ("func", 1.0)]));
        corpus
    }

    #[test]
    fn test_majority_vote() {
        let config = KnnConfig {
            k: 3,
            metric: DistanceMetric::Euclidean,
        };
        let knn = KnnClassifier::train(&corpus(), &config).unwrap();
        // Two go samples outvote the nearest python sample.
        assert_eq!(knn.classify(&vector(&[("def", 9.0), ("func", 1.0)])), "go");

        let config = KnnConfig { k: 1, ..config };
        let knn = KnnClassifier::train(&corpus(), &config).unwrap();
        assert_eq!(knn.classify(&vector(&[("def", 9.0), ("func", 1.0)])), "python");
    }

    #[test]
    fn test_vote_tie_goes_to_nearest() {
        let mut corpus = SampleCorpus::new();
        corpus.add_sample("go", vector(&[("func", 1.0)]));
        corpus.add_sample("python", vector(&[("def", 1.0)]));
        let knn = KnnClassifier::train(&corpus, &KnnConfig::default()).unwrap();
        assert_eq!(knn.classify(&vector(&[("def", 5.0), ("func", 1.0)])), "python");
        assert_eq!(knn.classify(&vector(&[("func", 5.0), ("def", 1.0)])), "go");
    }

    #[test]
    fn test_zero_vector() {
        let knn = KnnClassifier::train(&corpus(), &KnnConfig::default()).unwrap();
        let label = knn.classify(&FrequencyVector::new());
        assert!(knn.labels().iter().any(|l| l == label));
    }

    #[test]
    fn test_rejects_zero_k() {
        let config = KnnConfig {
            k: 0,
            ..KnnConfig::default()
        };
        assert!(KnnClassifier::train(&corpus(), &config).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let config = KnnConfig {
            k: 2,
            metric: DistanceMetric::Manhattan,
        };
        let knn = KnnClassifier::train(&corpus(), &config).unwrap();
        let decoded = KnnClassifier::decode(&knn.encode()).unwrap();
        assert_eq!(decoded.k(), 2);
        assert_eq!(decoded.metric(), DistanceMetric::Manhattan);
        assert_eq!(decoded.rows, knn.rows);
        assert_eq!(decoded.targets, knn.targets);
    }
}
