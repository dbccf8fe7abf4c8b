//! Command implementations for the codelang CLI.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use log::{info, warn};

use crate::bundle::{BundleRun, ModelBundle};
use crate::classifier::{Backend, Classifier};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::TrainingConfig;
use crate::corpus::SampleCorpus;
use crate::error::{CodelangError, Result};
use crate::tokenizer::{RegexTokenizer, Tokenizer};
use crate::training::{CancellationToken, Trainer, TrainingReport, evaluate};

/// Execute a CLI command.
pub fn execute_command(args: CodelangArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train(train_args.clone(), &args),
        Command::Sweep(sweep_args) => sweep(sweep_args.clone(), &args),
        Command::Classify(classify_args) => classify(classify_args.clone(), &args),
        Command::Evaluate(evaluate_args) => evaluate_bundle(evaluate_args.clone(), &args),
        Command::Backends => list_backends(&args),
    }
}

/// Train every selected backend at one vocabulary size.
fn train(args: TrainArgs, cli_args: &CodelangArgs) -> Result<()> {
    let start = Instant::now();
    let config = load_config(cli_args, &args.backends, args.threads)?;
    let tokenizer = RegexTokenizer::new()?;
    let corpus = load_samples(&args.sample_dir, &tokenizer)?;

    let validation = match &args.validation {
        Some(dir) => Some(load_samples(dir, &tokenizer)?),
        None if args.best_only => {
            warn!("No validation directory given, ranking models on the training samples");
            None
        }
        None => None,
    };

    let trainer = Trainer::new(config)?;
    let report = trainer.train(&corpus, args.max_vocab)?;
    ensure_trained(std::slice::from_ref(&report))?;

    let mut run = BundleRun::from_report(&report);
    if args.best_only {
        let ranking = validation.as_ref().unwrap_or(&corpus);
        if let Some((best, evaluation)) = report.best(ranking) {
            info!(
                "Keeping {} with accuracy {:.3}",
                best.backend(),
                evaluation.accuracy()
            );
            run.retain_backend(best.backend());
        }
    }

    let mut bundle = ModelBundle::new();
    bundle.runs.push(run);
    bundle.save(&args.output)?;

    let result = TrainingResult {
        output: args.output.display().to_string(),
        samples: corpus.num_samples(),
        languages: corpus.num_languages(),
        runs: vec![summarize(&report, validation.as_ref())],
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Training completed", &result, cli_args)
}

/// Train at every requested vocabulary size into one bundle.
fn sweep(args: SweepArgs, cli_args: &CodelangArgs) -> Result<()> {
    let start = Instant::now();
    let config = load_config(cli_args, &args.backends, args.threads)?;
    let tokenizer = RegexTokenizer::new()?;
    let corpus = load_samples(&args.sample_dir, &tokenizer)?;

    let trainer = Trainer::new(config)?;
    let reports = trainer.sweep(&corpus, &args.sizes, &CancellationToken::new())?;
    ensure_trained(&reports)?;

    let bundle = ModelBundle::from_reports(&reports);
    bundle.save(&args.output)?;

    let result = TrainingResult {
        output: args.output.display().to_string(),
        samples: corpus.num_samples(),
        languages: corpus.num_languages(),
        runs: reports.iter().map(|r| summarize(r, None)).collect(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Sweep completed", &result, cli_args)
}

/// Classify files with one model of a bundle.
fn classify(args: ClassifyArgs, cli_args: &CodelangArgs) -> Result<()> {
    let bundle = ModelBundle::load(&args.bundle)?;
    let (max_vocabulary, entry) = bundle.find(args.backend, args.vocab_size).ok_or_else(|| {
        CodelangError::configuration(format!(
            "no trained model in {} matches the requested backend and vocabulary size",
            args.bundle.display()
        ))
    })?;
    let classifier = entry.decode()?;
    let tokenizer = RegexTokenizer::new()?;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let vector = tokenizer.count(&String::from_utf8_lossy(&bytes));
        files.push(FileClassification {
            path: path.display().to_string(),
            language: classifier.classify(&vector).to_string(),
        });
    }

    let result = ClassificationResult {
        backend: entry.backend.to_string(),
        max_vocabulary,
        files,
    };
    output_result(
        &format!("Classified with {} (K={max_vocabulary})", entry.backend),
        &result,
        cli_args,
    )
}

/// Score every bundled model on a labeled directory.
fn evaluate_bundle(args: EvaluateArgs, cli_args: &CodelangArgs) -> Result<()> {
    let bundle = ModelBundle::load(&args.bundle)?;
    let tokenizer = RegexTokenizer::new()?;
    let corpus = load_samples(&args.sample_dir, &tokenizer)?;

    let mut models = Vec::new();
    for (max_vocabulary, entry) in bundle.entries().filter(|(_, e)| e.is_trained()) {
        let classifier = entry.decode()?;
        let evaluation = evaluate(classifier.as_ref(), &corpus);
        models.push(ModelEvaluation {
            backend: entry.backend.to_string(),
            max_vocabulary,
            correct: evaluation.correct,
            total: evaluation.total,
            accuracy: evaluation.accuracy(),
        });
    }

    let result = EvaluationResult {
        sample_dir: args.sample_dir.display().to_string(),
        models,
    };
    output_result("Evaluation completed", &result, cli_args)
}

/// List every backend.
fn list_backends(cli_args: &CodelangArgs) -> Result<()> {
    let result = BackendList {
        backends: Backend::ALL
            .iter()
            .map(|b| BackendInfo {
                name: b.name().to_string(),
                description: b.description().to_string(),
            })
            .collect(),
    };
    output_result("Available backends", &result, cli_args)
}

/// Build the training configuration from the config file and flags.
fn load_config(
    cli_args: &CodelangArgs,
    backends: &[Backend],
    threads: Option<usize>,
) -> Result<TrainingConfig> {
    let mut config = match &cli_args.config {
        Some(path) => {
            if cli_args.verbosity() > 1 {
                println!("Loading configuration from: {}", path.display());
            }
            TrainingConfig::from_json_file(path)?
        }
        None => TrainingConfig::default(),
    };
    if !backends.is_empty() {
        config = config.with_backends(backends.to_vec());
    }
    if let Some(threads) = threads {
        config = config.with_threads(threads);
    }
    config.validate()?;
    Ok(config)
}

fn load_samples(dir: &Path, tokenizer: &dyn Tokenizer) -> Result<SampleCorpus> {
    let corpus = SampleCorpus::load_dir(dir, tokenizer)?;
    info!(
        "Loaded {} samples of {} languages from {}",
        corpus.num_samples(),
        corpus.num_languages(),
        dir.display()
    );
    Ok(corpus)
}

/// Fail when no run produced a single model.
fn ensure_trained(reports: &[TrainingReport]) -> Result<()> {
    if reports.iter().all(|r| r.classifiers().is_empty()) {
        return Err(CodelangError::other("no backend trained successfully"));
    }
    Ok(())
}

fn summarize(report: &TrainingReport, validation: Option<&SampleCorpus>) -> RunSummary {
    let backends = report
        .outcomes
        .iter()
        .map(|outcome| {
            let status = match outcome.error() {
                None => "trained".to_string(),
                Some(e) => format!("failed: {e}"),
            };
            let accuracy = match (outcome.classifier(), validation) {
                (Some(classifier), Some(corpus)) => Some(evaluate(classifier, corpus).accuracy()),
                _ => None,
            };
            BackendSummary {
                backend: outcome.backend.to_string(),
                status,
                training_ms: outcome.elapsed.as_millis() as u64,
                accuracy,
            }
        })
        .collect();
    RunSummary {
        max_vocabulary: report.max_vocabulary,
        vocabulary_size: report.vocabulary.len(),
        backends,
    }
}
