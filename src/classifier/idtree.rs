//! Decision tree classifier grown with ID3.
//!
//! Each internal node thresholds the normalized frequency of one vocabulary
//! token; the token and threshold are chosen to maximize information gain.
//! Leaves hold the majority label of the training samples that reach them.

use log::debug;

use crate::classifier::{Backend, Classifier, TrainingSet, argmax, read_common, write_common};
use crate::codec::{ModelReader, ModelWriter};
use crate::config::{IdTreeConfig, MAX_TREE_DEPTH};
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"CLDT";
const VERSION: u16 = 1;

const LEAF_TAG: u8 = 0;
const SPLIT_TAG: u8 = 1;

/// Minimum information gain for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        label: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.leaves() + right.leaves(),
        }
    }

    fn write(&self, writer: &mut ModelWriter) {
        match self {
            Node::Leaf { label } => {
                writer.write_u8(LEAF_TAG);
                writer.write_len(*label);
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                writer.write_u8(SPLIT_TAG);
                writer.write_len(*feature);
                writer.write_f64(*threshold);
                left.write(writer);
                right.write(writer);
            }
        }
    }

    fn read(
        reader: &mut ModelReader<'_>,
        num_labels: usize,
        num_features: usize,
        depth: usize,
    ) -> Result<Node> {
        if depth > MAX_TREE_DEPTH {
            return Err(CodelangError::decode("decision tree too deep"));
        }
        match reader.read_u8()? {
            LEAF_TAG => {
                let label = reader.read_varint()? as usize;
                if label >= num_labels {
                    return Err(CodelangError::decode(format!(
                        "leaf label {label} out of range"
                    )));
                }
                Ok(Node::Leaf { label })
            }
            SPLIT_TAG => {
                let feature = reader.read_varint()? as usize;
                if feature >= num_features {
                    return Err(CodelangError::decode(format!(
                        "split feature {feature} out of range"
                    )));
                }
                let threshold = reader.read_finite_f64()?;
                let left = Node::read(reader, num_labels, num_features, depth + 1)?;
                let right = Node::read(reader, num_labels, num_features, depth + 1)?;
                Ok(Node::Split {
                    feature,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            tag => Err(CodelangError::decode(format!("unknown node tag {tag}"))),
        }
    }
}

/// Decision tree classifier.
#[derive(Debug, Clone)]
pub struct IdTreeClassifier {
    labels: Vec<String>,
    vocabulary: Vocabulary,
    root: Node,
}

impl IdTreeClassifier {
    /// Grow a tree on `corpus`.
    pub fn train(corpus: &SampleCorpus, config: &IdTreeConfig) -> Result<Self> {
        config.validate()?;
        let set = TrainingSet::new(corpus)?;
        let indices: Vec<usize> = (0..set.rows.len()).collect();
        let root = TreeBuilder { set: &set, config }.build(&indices, 0);

        debug!(
            "Grew decision tree: depth {}, {} leaves",
            root.depth(),
            root.leaves()
        );

        Ok(IdTreeClassifier {
            labels: set.labels,
            vocabulary: set.vocabulary,
            root,
        })
    }

    /// Decode a tree written by [`Classifier::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ModelReader::open(data, MAGIC, VERSION)?;
        let (labels, vocabulary) = read_common(&mut reader)?;
        let root = Node::read(&mut reader, labels.len(), vocabulary.len(), 0)?;
        reader.finish()?;
        Ok(IdTreeClassifier {
            labels,
            vocabulary,
            root,
        })
    }

    /// Depth of the tree; a single leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl Classifier for IdTreeClassifier {
    fn classify(&self, vector: &FrequencyVector) -> &str {
        let features = self.vocabulary.project(vector);
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { label } => return &self.labels[*label],
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, VERSION);
        write_common(&mut writer, &self.labels, &self.vocabulary);
        self.root.write(&mut writer);
        writer.finish()
    }

    fn backend(&self) -> Backend {
        Backend::IdTree
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

struct TreeBuilder<'a> {
    set: &'a TrainingSet,
    config: &'a IdTreeConfig,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize) -> Node {
        let counts = self.label_counts(indices);
        let majority = majority(&counts);

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.config.max_depth || indices.len() < self.config.min_samples_split
        {
            return Node::Leaf { label: majority };
        }

        let Some(split) = self.best_split(indices, &counts) else {
            return Node::Leaf { label: majority };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.set.rows[i][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    fn label_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.set.num_labels()];
        for &i in indices {
            counts[self.set.targets[i]] += 1;
        }
        counts
    }

    /// Best threshold split over all features; ties keep the lower feature
    /// and then the lower threshold.
    fn best_split(&self, indices: &[usize], counts: &[usize]) -> Option<SplitCandidate> {
        let total = indices.len();
        let parent_entropy = entropy(counts, total);
        let mut best: Option<SplitCandidate> = None;

        let mut column: Vec<(f64, usize)> = Vec::with_capacity(total);
        for feature in 0..self.set.num_features() {
            column.clear();
            column.extend(
                indices
                    .iter()
                    .map(|&i| (self.set.rows[i][feature], self.set.targets[i])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut left_counts = vec![0; counts.len()];
            for pos in 0..total - 1 {
                left_counts[column[pos].1] += 1;
                let (value, next) = (column[pos].0, column[pos + 1].0);
                if value == next {
                    continue;
                }

                let left_total = pos + 1;
                let right_total = total - left_total;
                let right_counts: Vec<usize> = counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(all, left)| all - left)
                    .collect();
                let remainder = (left_total as f64 / total as f64)
                    * entropy(&left_counts, left_total)
                    + (right_total as f64 / total as f64) * entropy(&right_counts, right_total);
                let gain = parent_entropy - remainder;

                let improves = match &best {
                    Some(current) => gain > current.gain,
                    None => gain > MIN_GAIN,
                };
                if improves {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

fn majority(counts: &[usize]) -> usize {
    let scores: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    argmax(&scores)
}

fn entropy(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}
