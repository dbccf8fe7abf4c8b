//! Distance metrics between dense feature vectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodelangError, Result};

/// Distance metrics for nearest neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    #[default]
    Cosine,
    /// Euclidean (L2) distance
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
}

impl DistanceMetric {
    /// Every metric, in persisted tag order.
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
    ];

    /// Calculate the distance between two vectors of equal length.
    ///
    /// Cosine distance against a zero vector is the maximum, 1.0.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => {
                let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
                }
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            DistanceMetric::Cosine => 0,
            DistanceMetric::Euclidean => 1,
            DistanceMetric::Manhattan => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        DistanceMetric::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| CodelangError::decode(format!("unknown distance metric tag {tag}")))
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = CodelangError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            _ => Err(CodelangError::configuration(format!(
                "Unknown distance metric: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distances() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-12);
        assert!(DistanceMetric::Cosine.distance(&a, &a).abs() < 1e-12);
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(DistanceMetric::Manhattan.distance(&a, &b), 2.0);
    }

    #[test]
    fn test_zero_vector() {
        let zero = [0.0, 0.0];
        assert_eq!(DistanceMetric::Cosine.distance(&zero, &[0.5, 0.5]), 1.0);
        assert_eq!(DistanceMetric::Euclidean.distance(&zero, &zero), 0.0);
    }

    #[test]
    fn test_parse_and_tags() {
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert!("hamming".parse::<DistanceMetric>().is_err());
        for metric in DistanceMetric::ALL {
            assert_eq!(DistanceMetric::from_tag(metric.tag()).unwrap(), metric);
        }
        assert!(DistanceMetric::from_tag(9).unwrap_err().is_decode());
    }
}
