//! Training orchestration: vocabulary selection, parallel backend training,
//! vocabulary-size sweeps and evaluation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::classifier::{Backend, Classifier};
use crate::config::TrainingConfig;
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::vocabulary::{Vocabulary, VocabularySelector};

/// Shared flag used to stop a sweep between vocabulary sizes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of training one backend.
#[derive(Debug)]
pub struct BackendOutcome {
    /// The backend that was trained.
    pub backend: Backend,

    /// Wall time spent training.
    pub elapsed: Duration,

    /// The trained model, or the reason training failed.
    pub result: Result<Box<dyn Classifier>>,
}

impl BackendOutcome {
    /// Whether the backend produced a model.
    pub fn is_trained(&self) -> bool {
        self.result.is_ok()
    }

    /// The trained model, if any.
    pub fn classifier(&self) -> Option<&dyn Classifier> {
        self.result.as_ref().ok().map(|c| c.as_ref())
    }

    /// The training error, if any.
    pub fn error(&self) -> Option<&CodelangError> {
        self.result.as_ref().err()
    }
}

/// Outcome of one training run at a fixed vocabulary size.
#[derive(Debug)]
pub struct TrainingReport {
    /// The vocabulary size bound of this run.
    pub max_vocabulary: usize,

    /// The selected vocabulary shared by every backend.
    pub vocabulary: Vocabulary,

    /// One outcome per selected backend, in configuration order.
    pub outcomes: Vec<BackendOutcome>,
}

impl TrainingReport {
    /// Every trained model, in configuration order.
    pub fn classifiers(&self) -> Vec<&dyn Classifier> {
        self.outcomes
            .iter()
            .filter_map(BackendOutcome::classifier)
            .collect()
    }

    /// Every backend that failed, with its error.
    pub fn failures(&self) -> Vec<(Backend, &CodelangError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.backend, e)))
            .collect()
    }

    /// The outcome of `backend`, if it was selected.
    pub fn outcome(&self, backend: Backend) -> Option<&BackendOutcome> {
        self.outcomes.iter().find(|o| o.backend == backend)
    }

    /// The trained model with the highest accuracy on `validation`.
    ///
    /// Ties go to the model that comes first in configuration order.
    pub fn best(&self, validation: &SampleCorpus) -> Option<(&dyn Classifier, Evaluation)> {
        let mut best: Option<(&dyn Classifier, Evaluation)> = None;
        for classifier in self.classifiers() {
            let evaluation = evaluate(classifier, validation);
            let better = match &best {
                Some((_, current)) => evaluation.accuracy() > current.accuracy(),
                None => true,
            };
            if better {
                best = Some((classifier, evaluation));
            }
        }
        best
    }
}

/// Accuracy of a model on a labeled corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Samples classified with their own language.
    pub correct: usize,

    /// Samples classified.
    pub total: usize,
}

impl Evaluation {
    /// Fraction of samples classified correctly; 0 for an empty corpus.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Classify every sample of `corpus` and count the correct labels.
pub fn evaluate(classifier: &dyn Classifier, corpus: &SampleCorpus) -> Evaluation {
    let mut evaluation = Evaluation {
        correct: 0,
        total: 0,
    };
    for (language, samples) in corpus.iter() {
        for sample in samples {
            evaluation.total += 1;
            if classifier.classify(sample) == language {
                evaluation.correct += 1;
            }
        }
    }
    evaluation
}

/// Drives vocabulary selection and backend training.
pub struct Trainer {
    config: TrainingConfig,
    thread_pool: Arc<ThreadPool>,
}

impl Trainer {
    /// Create a trainer. Fails on an invalid configuration.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let thread_pool_size = config.threads.unwrap_or_else(num_cpus::get);

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(thread_pool_size)
            .thread_name(|i| format!("codelang-train-{i}"))
            .build()
            .map_err(|e| CodelangError::other(format!("Failed to create thread pool: {e}")))?;

        Ok(Self {
            config,
            thread_pool: Arc::new(thread_pool),
        })
    }

    /// The configuration of this trainer.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Select a vocabulary of at most `max_vocabulary` tokens and train every
    /// configured backend on the reduced corpus.
    ///
    /// Backend failures are recorded in the report; only an invalid corpus
    /// or vocabulary size fails the whole run.
    pub fn train(&self, corpus: &SampleCorpus, max_vocabulary: usize) -> Result<TrainingReport> {
        let selector = VocabularySelector::new(max_vocabulary)?;
        corpus.validate()?;

        let vocabulary = selector.select(corpus);
        let reduced = corpus.reduce(&vocabulary);
        info!(
            "Training {} backends on {} samples of {} languages with {} of at most {} tokens",
            self.config.backends.len(),
            corpus.num_samples(),
            corpus.num_languages(),
            vocabulary.len(),
            max_vocabulary
        );

        let outcomes: Vec<BackendOutcome> = self.thread_pool.install(|| {
            self.config
                .backends
                .par_iter()
                .map(|&backend| {
                    let start = Instant::now();
                    let result = backend.train(&reduced, &self.config);
                    let elapsed = start.elapsed();
                    match &result {
                        Ok(_) => debug!("Trained {backend} in {elapsed:?}"),
                        Err(e) => warn!("Backend {backend} failed: {e}"),
                    }
                    BackendOutcome {
                        backend,
                        elapsed,
                        result,
                    }
                })
                .collect()
        });

        Ok(TrainingReport {
            max_vocabulary,
            vocabulary,
            outcomes,
        })
    }

    /// Train once per vocabulary size, in order.
    ///
    /// `cancel` is checked before each size; once set, the reports completed
    /// so far are returned.
    pub fn sweep(
        &self,
        corpus: &SampleCorpus,
        sizes: &[usize],
        cancel: &CancellationToken,
    ) -> Result<Vec<TrainingReport>> {
        if sizes.is_empty() {
            return Err(CodelangError::configuration("no vocabulary size given"));
        }
        for &size in sizes {
            VocabularySelector::new(size)?;
        }
        corpus.validate()?;

        let mut reports = Vec::with_capacity(sizes.len());
        for &size in sizes {
            if cancel.is_cancelled() {
                info!(
                    "Sweep cancelled after {} of {} sizes",
                    reports.len(),
                    sizes.len()
                );
                break;
            }
            reports.push(self.train(corpus, size)?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FrequencyVector;

    fn vector(pairs: &[(&str, f64)]) -> FrequencyVector {
        FrequencyVector::from_counts(pairs.iter().map(|&(t, c)| (t, c))).unwrap()
    }

    fn corpus() -> SampleCorpus {
        let mut corpus = SampleCorpus::new();
        corpus.add_sample("go", vector(&[("func", 9.0), ("def", 1.0), ("x", 3.0)]));
        corpus.add_sample("go", vector(&[("func", 7.0), ("def", 2.0), ("x", 2.0)]));
        corpus.add_sample("python", vector(&[("def", 9.0), ("func", 1.0), ("x", 3.0)]));
        corpus.add_sample("python", vector(&[("def", 6.0), ("x", 2.0)]));
        corpus
    }

    fn trainer(backends: Vec<Backend>) -> Trainer {
        let config = TrainingConfig::default()
            .with_backends(backends)
            .with_threads(2);
        Trainer::new(config).unwrap()
    }

    #[test]
    fn test_train_every_backend() {
        let report = trainer(Backend::ALL.to_vec()).train(&corpus(), 2).unwrap();
        assert_eq!(report.vocabulary.len(), 2);
        assert_eq!(report.outcomes.len(), 5);
        assert!(report.failures().is_empty());
        for (outcome, backend) in report.outcomes.iter().zip(Backend::ALL) {
            assert_eq!(outcome.backend, backend);
            let classifier = outcome.classifier().unwrap();
            assert_eq!(classifier.backend(), backend);
            let vocabulary = classifier.vocabulary();
            assert_eq!(vocabulary.len(), report.vocabulary.len());
            assert!(report.vocabulary.tokens().iter().all(|t| vocabulary.contains(t)));
        }
    }

    #[test]
    fn test_rejects_zero_vocabulary() {
        let err = trainer(vec![Backend::Knn]).train(&corpus(), 0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_empty_corpus() {
        let err = trainer(vec![Backend::Knn])
            .train(&SampleCorpus::new(), 10)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_best_prefers_accuracy() {
        let report = trainer(vec![Backend::Knn, Backend::GaussBayes])
            .train(&corpus(), 2)
            .unwrap();
        let (best, evaluation) = report.best(&corpus()).unwrap();
        assert_eq!(evaluation.total, 4);
        assert_eq!(evaluation.correct, 4);
        // Both are perfect on the training set, so the first one wins.
        assert_eq!(best.backend(), Backend::Knn);
    }

    #[test]
    fn test_sweep_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reports = trainer(vec![Backend::IdTree])
            .sweep(&corpus(), &[1, 2], &cancel)
            .unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn test_sweep_runs_every_size() {
        let reports = trainer(vec![Backend::IdTree])
            .sweep(&corpus(), &[1, 3], &CancellationToken::new())
            .unwrap();
        let sizes: Vec<usize> = reports.iter().map(|r| r.max_vocabulary).collect();
        assert_eq!(sizes, vec![1, 3]);
        assert_eq!(reports[0].vocabulary.len(), 1);
        assert_eq!(reports[1].vocabulary.len(), 3);
    }

    #[test]
    fn test_evaluation_accuracy() {
        let evaluation = Evaluation {
            correct: 3,
            total: 4,
        };
        assert_eq!(evaluation.accuracy(), 0.75);
        let empty = Evaluation {
            correct: 0,
            total: 0,
        };
        assert_eq!(empty.accuracy(), 0.0);
    }
}
