//! JSON model bundle written by the driver.
//!
//! A bundle holds one run per vocabulary size; every run lists the outcome of
//! each backend and, for trained backends, the encoded model bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{Backend, Classifier};
use crate::error::{CodelangError, Result};
use crate::training::TrainingReport;

/// Current bundle format version.
pub const FORMAT_VERSION: u32 = 1;

/// Status of one bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Trained,
    Failed,
}

/// Outcome of one backend in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub backend: Backend,
    pub description: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub training_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Vec<u8>>,
}

impl BundleEntry {
    /// Whether this entry carries a model.
    pub fn is_trained(&self) -> bool {
        self.status == EntryStatus::Trained && self.model.is_some()
    }

    /// Decode the model of this entry with its backend.
    pub fn decode(&self) -> Result<Box<dyn Classifier>> {
        let model = self.model.as_deref().ok_or_else(|| {
            CodelangError::decode(format!("bundle entry for {} has no model", self.backend))
        })?;
        self.backend.decode(model)
    }
}

/// Every backend outcome for one vocabulary size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRun {
    pub max_vocabulary: usize,
    pub vocabulary: Vec<String>,
    pub entries: Vec<BundleEntry>,
}

impl BundleRun {
    /// Capture a training report, encoding every trained model.
    pub fn from_report(report: &TrainingReport) -> Self {
        let entries = report
            .outcomes
            .iter()
            .map(|outcome| {
                let (status, error, model) = match &outcome.result {
                    Ok(classifier) => (EntryStatus::Trained, None, Some(classifier.encode())),
                    Err(e) => (EntryStatus::Failed, Some(e.to_string()), None),
                };
                BundleEntry {
                    backend: outcome.backend,
                    description: outcome.backend.description().to_string(),
                    status,
                    error,
                    training_ms: outcome.elapsed.as_millis() as u64,
                    model,
                }
            })
            .collect();
        BundleRun {
            max_vocabulary: report.max_vocabulary,
            vocabulary: report.vocabulary.tokens().to_vec(),
            entries,
        }
    }

    /// Keep only the entry of `backend`.
    pub fn retain_backend(&mut self, backend: Backend) {
        self.entries.retain(|e| e.backend == backend);
    }
}

/// A set of training runs persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<BundleRun>,
}

impl Default for ModelBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBundle {
    /// Create an empty bundle stamped with the current time.
    pub fn new() -> Self {
        ModelBundle {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Create a bundle holding one run per report.
    pub fn from_reports(reports: &[TrainingReport]) -> Self {
        let mut bundle = Self::new();
        bundle.runs = reports.iter().map(BundleRun::from_report).collect();
        bundle
    }

    /// Number of entries that carry a model.
    pub fn trained_count(&self) -> usize {
        self.entries().filter(|(_, e)| e.is_trained()).count()
    }

    /// Every entry with the vocabulary size of its run.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &BundleEntry)> {
        self.runs
            .iter()
            .flat_map(|run| run.entries.iter().map(move |e| (run.max_vocabulary, e)))
    }

    /// The first trained entry matching the optional backend and vocabulary
    /// size filters.
    pub fn find(
        &self,
        backend: Option<Backend>,
        max_vocabulary: Option<usize>,
    ) -> Option<(usize, &BundleEntry)> {
        self.entries().find(|(size, entry)| {
            entry.is_trained()
                && backend.is_none_or(|b| entry.backend == b)
                && max_vocabulary.is_none_or(|k| *size == k)
        })
    }

    /// Write the bundle as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read a bundle written by [`ModelBundle::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let bundle: ModelBundle = serde_json::from_reader(BufReader::new(file))?;
        if bundle.format_version != FORMAT_VERSION {
            return Err(CodelangError::decode(format!(
                "unsupported bundle format version {} (expected {FORMAT_VERSION})",
                bundle.format_version
            )));
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::corpus::SampleCorpus;
    use crate::features::FrequencyVector;
    use crate::training::Trainer;

    fn report() -> TrainingReport {
        let mut corpus = SampleCorpus::new();
        corpus.add_sample("go", FrequencyVector::from_counts([("func", 5.0)]).unwrap());
        corpus.add_sample("python", FrequencyVector::from_counts([("def", 5.0)]).unwrap());
        let mut config = TrainingConfig::default()
            .with_backends(vec![Backend::IdTree, Backend::NeuralNet])
            .with_threads(1);
        config.neuralnet.learning_rate = 1e308;
        config.neuralnet.epochs = 50;
        Trainer::new(config).unwrap().train(&corpus, 10).unwrap()
    }

    #[test]
    fn test_from_report() {
        let run = BundleRun::from_report(&report());
        assert_eq!(run.max_vocabulary, 10);
        assert_eq!(run.entries.len(), 2);
        assert!(run.entries[0].is_trained());
        assert_eq!(run.entries[0].description, "decision trees generated with ID3");
        assert_eq!(run.entries[1].status, EntryStatus::Failed);
        assert!(run.entries[1].error.is_some());
        assert!(run.entries[1].decode().is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        let bundle = ModelBundle::from_reports(&[report()]);
        bundle.save(&path).unwrap();

        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded, bundle);
        assert_eq!(loaded.trained_count(), 1);

        let (size, entry) = loaded.find(None, None).unwrap();
        assert_eq!(size, 10);
        let model = entry.decode().unwrap();
        let query = FrequencyVector::from_counts([("def", 2.0)]).unwrap();
        assert_eq!(model.classify(&query), "python");
        assert!(loaded.find(Some(Backend::NeuralNet), None).is_none());
        assert!(loaded.find(None, Some(3)).is_none());
    }

    #[test]
    fn test_failed_entry_omits_model() {
        let bundle = ModelBundle::from_reports(&[report()]);
        let json = serde_json::to_value(&bundle).unwrap();
        let failed = &json["runs"][0]["entries"][1];
        assert_eq!(failed["status"], "failed");
        assert!(failed.get("model").is_none());
        assert_eq!(json["runs"][0]["entries"][0]["status"], "trained");
    }
}
