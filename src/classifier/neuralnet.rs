//! Feedforward neural network classifier.
//!
//! One hidden layer of sigmoid units feeds a softmax output layer with one
//! unit per label. Training is per-sample SGD on cross-entropy for a fixed
//! number of epochs, seeded so that runs are reproducible.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::classifier::{Backend, Classifier, TrainingSet, argmax, read_common, write_common};
use crate::codec::{ModelReader, ModelWriter};
use crate::config::NeuralNetConfig;
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::features::FrequencyVector;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"CLNN";
const VERSION: u16 = 1;

/// Weights beyond this magnitude mean training has diverged.
const MAX_WEIGHT: f64 = 1e100;

/// A fully connected layer, weights stored row-major (`outputs x inputs`).
#[derive(Debug, Clone, PartialEq)]
struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Layer {
    fn random(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.random_range(-bound..bound))
            .collect();
        let biases = (0..outputs).map(|_| rng.random_range(-bound..bound)).collect();
        Layer {
            inputs,
            outputs,
            weights,
            biases,
        }
    }

    fn forward(&self, input: &[f64], output: &mut [f64]) {
        for (o, out) in output.iter_mut().enumerate() {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            *out = self.biases[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
        }
    }

    fn is_bounded(&self) -> bool {
        self.weights
            .iter()
            .chain(&self.biases)
            .all(|w| w.is_finite() && w.abs() <= MAX_WEIGHT)
    }

    fn write(&self, writer: &mut ModelWriter) {
        writer.write_f64s(&self.weights);
        writer.write_f64s(&self.biases);
    }

    fn read(reader: &mut ModelReader<'_>, inputs: usize, outputs: usize) -> Result<Self> {
        let count = inputs
            .checked_mul(outputs)
            .ok_or_else(|| CodelangError::decode("layer size overflow"))?;
        let weights = reader.read_f64s_exact(count, "layer weights")?;
        let biases = reader.read_f64s_exact(outputs, "layer biases")?;
        Ok(Layer {
            inputs,
            outputs,
            weights,
            biases,
        })
    }
}

/// Feedforward network classifier.
#[derive(Debug, Clone)]
pub struct NeuralNetClassifier {
    labels: Vec<String>,
    vocabulary: Vocabulary,
    input_scale: Vec<f64>,
    hidden: Layer,
    output: Layer,
}

impl NeuralNetClassifier {
    /// Train a network on `corpus`.
    pub fn train(corpus: &SampleCorpus, config: &NeuralNetConfig) -> Result<Self> {
        config.validate()?;
        let set = TrainingSet::new(corpus)?;
        let num_inputs = set.num_features();
        let num_outputs = set.num_labels();

        // Scale every input so that its largest training value is 1.
        let mut input_scale = vec![1.0; num_inputs];
        for (i, scale) in input_scale.iter_mut().enumerate() {
            let max = set.rows.iter().map(|row| row[i]).fold(0.0, f64::max);
            if max > 0.0 {
                *scale = max;
            }
        }
        let inputs: Vec<Vec<f64>> = set.rows.iter().map(|row| scale(row, &input_scale)).collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut network = Network {
            hidden: Layer::random(num_inputs, config.hidden_units, &mut rng),
            output: Layer::random(config.hidden_units, num_outputs, &mut rng),
        };

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut loss = 0.0;
        for _ in 0..config.epochs {
            order.shuffle(&mut rng);
            loss = 0.0;
            for &i in &order {
                loss += network.step(&inputs[i], set.targets[i], config.learning_rate);
            }
            if !loss.is_finite() || !network.is_bounded() {
                break;
            }
        }

        if !loss.is_finite() || !network.is_bounded() {
            return Err(CodelangError::training(
                Backend::NeuralNet,
                "weights diverged",
            ));
        }
        debug!(
            "Trained neural network: {} epochs, final loss {:.6}",
            config.epochs,
            loss / inputs.len() as f64
        );

        Ok(NeuralNetClassifier {
            labels: set.labels,
            vocabulary: set.vocabulary,
            input_scale,
            hidden: network.hidden,
            output: network.output,
        })
    }

    /// Decode a network written by [`Classifier::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ModelReader::open(data, MAGIC, VERSION)?;
        let (labels, vocabulary) = read_common(&mut reader)?;
        let hidden_units = reader.read_len(1)?;
        if hidden_units == 0 {
            return Err(CodelangError::decode("network has no hidden units"));
        }
        let input_scale = reader.read_f64s_exact(vocabulary.len(), "input scale")?;
        if input_scale.iter().any(|&s| s <= 0.0) {
            return Err(CodelangError::decode("input scale must be positive"));
        }
        let hidden = Layer::read(&mut reader, vocabulary.len(), hidden_units)?;
        let output = Layer::read(&mut reader, hidden_units, labels.len())?;
        reader.finish()?;
        Ok(NeuralNetClassifier {
            labels,
            vocabulary,
            input_scale,
            hidden,
            output,
        })
    }

    /// Output scores (pre-softmax) for `vector`, one per label.
    pub fn scores(&self, vector: &FrequencyVector) -> Vec<f64> {
        let input = scale(&self.vocabulary.project(vector), &self.input_scale);
        let mut hidden = vec![0.0; self.hidden.outputs];
        self.hidden.forward(&input, &mut hidden);
        hidden.iter_mut().for_each(|h| *h = sigmoid(*h));
        let mut output = vec![0.0; self.output.outputs];
        self.output.forward(&hidden, &mut output);
        output
    }
}

impl Classifier for NeuralNetClassifier {
    fn classify(&self, vector: &FrequencyVector) -> &str {
        &self.labels[argmax(&self.scores(vector))]
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self) -> Vec<u8> {
        let mut writer = ModelWriter::new(MAGIC, VERSION);
        write_common(&mut writer, &self.labels, &self.vocabulary);
        writer.write_len(self.hidden.outputs);
        writer.write_f64s(&self.input_scale);
        self.hidden.write(&mut writer);
        self.output.write(&mut writer);
        writer.finish()
    }

    fn backend(&self) -> Backend {
        Backend::NeuralNet
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

struct Network {
    hidden: Layer,
    output: Layer,
}

impl Network {
    fn is_bounded(&self) -> bool {
        self.hidden.is_bounded() && self.output.is_bounded()
    }

    /// One SGD step on a single sample; returns its cross-entropy loss.
    fn step(&mut self, input: &[f64], target: usize, learning_rate: f64) -> f64 {
        let mut hidden = vec![0.0; self.hidden.outputs];
        self.hidden.forward(input, &mut hidden);
        hidden.iter_mut().for_each(|h| *h = sigmoid(*h));

        let mut output = vec![0.0; self.output.outputs];
        self.output.forward(&hidden, &mut output);
        let probs = softmax(&output);
        let loss = -probs[target].max(f64::MIN_POSITIVE).ln();

        // Gradient of cross-entropy with respect to the output logits.
        let output_delta: Vec<f64> = probs
            .iter()
            .enumerate()
            .map(|(o, p)| if o == target { p - 1.0 } else { *p })
            .collect();

        let mut hidden_delta = vec![0.0; self.hidden.outputs];
        for (o, delta) in output_delta.iter().enumerate() {
            let row = o * self.output.inputs;
            for (h, hd) in hidden_delta.iter_mut().enumerate() {
                *hd += self.output.weights[row + h] * delta;
            }
        }
        for (hd, h) in hidden_delta.iter_mut().zip(&hidden) {
            *hd *= h * (1.0 - h);
        }

        for (o, delta) in output_delta.iter().enumerate() {
            let row = o * self.output.inputs;
            for (h, value) in hidden.iter().enumerate() {
                self.output.weights[row + h] -= learning_rate * delta * value;
            }
            self.output.biases[o] -= learning_rate * delta;
        }
        for (h, delta) in hidden_delta.iter().enumerate() {
            let row = h * self.hidden.inputs;
            for (i, value) in input.iter().enumerate() {
                self.hidden.weights[row + i] -= learning_rate * delta * value;
            }
            self.hidden.biases[h] -= learning_rate * delta;
        }

        loss
    }
}

fn scale(row: &[f64], scale: &[f64]) -> Vec<f64> {
    row.iter().zip(scale).map(|(x, s)| x / s).collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
