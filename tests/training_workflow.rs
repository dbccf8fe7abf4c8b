use std::fs;
use std::path::Path;

use clap::Parser;

use codelang::bundle::{EntryStatus, ModelBundle};
use codelang::classifier::Backend;
use codelang::cli::args::CodelangArgs;
use codelang::cli::commands::execute_command;
use codelang::config::TrainingConfig;
use codelang::corpus::SampleCorpus;
use codelang::error::{CodelangError, Result};
use codelang::tokenizer::{RegexTokenizer, Tokenizer};
use codelang::training::{CancellationToken, Trainer, evaluate};

const GO_SAMPLES: &[&str] = &[
    "package main\n\nfunc main() {\n\tx := 1\n\tfmt.Println(x)\n}\n",
    "package util\n\nfunc Add(a, b int) int {\n\treturn a + b\n}\n",
    "func (s *Server) Run() error {\n\tctx := context.Background()\n\treturn s.run(ctx)\n}\n",
];

const PYTHON_SAMPLES: &[&str] = &[
    "def main():\n    x = 1\n    print(x)\n",
    "class Server:\n    def __init__(self):\n        self.port = 80\n",
    "import os\n\ndef run(self, ctx):\n    return self.start(ctx)\n",
];

fn write_samples(root: &Path) {
    for (language, samples) in [("go", GO_SAMPLES), ("python", PYTHON_SAMPLES)] {
        let dir = root.join(language);
        fs::create_dir_all(dir.join("nested")).unwrap();
        for (i, source) in samples.iter().enumerate() {
            let path = if i == 0 {
                dir.join("nested").join(format!("sample{i}.txt"))
            } else {
                dir.join(format!("sample{i}.txt"))
            };
            fs::write(path, source).unwrap();
        }
        fs::write(dir.join(".hidden"), "func def class").unwrap();
    }
}

fn load(root: &Path) -> Result<SampleCorpus> {
    SampleCorpus::load_dir(root, &RegexTokenizer::new()?)
}

#[test]
fn failing_backend_does_not_abort_the_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_samples(dir.path());
    let corpus = load(dir.path())?;

    let mut config = TrainingConfig::default().with_threads(3);
    config.neuralnet.learning_rate = 1e308;
    config.neuralnet.epochs = 20;

    let report = Trainer::new(config)?.train(&corpus, 20)?;
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Backend::NeuralNet);
    assert!(matches!(
        failures[0].1,
        CodelangError::Training {
            backend: Backend::NeuralNet,
            ..
        }
    ));
    assert_eq!(report.classifiers().len(), 4);
    assert!(report.outcome(Backend::Knn).unwrap().is_trained());
    Ok(())
}

#[test]
fn cancelled_sweep_stops_before_the_next_size() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_samples(dir.path());
    let corpus = load(dir.path())?;
    let trainer = Trainer::new(TrainingConfig::default().with_backends(vec![Backend::Knn]))?;

    let cancel = CancellationToken::new();
    let reports = trainer.sweep(&corpus, &[2, 5, 10], &cancel)?;
    assert_eq!(reports.len(), 3);

    let observer = cancel.clone();
    cancel.cancel();
    assert!(observer.is_cancelled());
    let reports = trainer.sweep(&corpus, &[2, 5, 10], &observer)?;
    assert!(reports.is_empty());
    Ok(())
}

#[test]
fn bundle_round_trips_and_models_decode() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_samples(dir.path());
    let corpus = load(dir.path())?;
    assert_eq!(corpus.num_samples(), 6);

    let reports = Trainer::new(TrainingConfig::default())?.sweep(
        &corpus,
        &[5, 30],
        &CancellationToken::new(),
    )?;
    let bundle = ModelBundle::from_reports(&reports);
    let path = dir.path().join("models.json");
    bundle.save(&path)?;
    let loaded = ModelBundle::load(&path)?;
    assert_eq!(loaded, bundle);
    assert_eq!(loaded.runs.len(), 2);

    let tokenizer = RegexTokenizer::new()?;
    let query = tokenizer.count("func main() {\n\ty := 2\n}\n");
    for (run, report) in loaded.runs.iter().zip(&reports) {
        assert_eq!(run.max_vocabulary, report.max_vocabulary);
        assert_eq!(run.vocabulary, report.vocabulary.tokens());
        for (entry, outcome) in run.entries.iter().zip(&report.outcomes) {
            assert_eq!(entry.backend, outcome.backend);
            assert_eq!(entry.status, EntryStatus::Trained);
            let decoded = entry.decode()?;
            let original = outcome.classifier().unwrap();
            assert_eq!(decoded.backend(), entry.backend);
            assert_eq!(decoded.classify(&query), original.classify(&query));
            assert_eq!(evaluate(decoded.as_ref(), &corpus), evaluate(original, &corpus));
        }
    }
    Ok(())
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn cli_train_then_classify() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let samples = dir.path().join("samples");
    write_samples(&samples);
    let output = dir.path().join("bundle.json");
    let source = dir.path().join("main.go");
    fs::write(&source, GO_SAMPLES[0])?;

    let args = CodelangArgs::try_parse_from([
        "codelang",
        "-q",
        "train",
        arg(&samples).as_str(),
        "25",
        arg(&output).as_str(),
        "--backend",
        "idtree",
        "--backend",
        "gaussbayes",
        "--best-only",
    ])
    .map_err(|e| CodelangError::other(e.to_string()))?;
    execute_command(args)?;

    let bundle = ModelBundle::load(&output)?;
    assert_eq!(bundle.runs.len(), 1);
    assert_eq!(bundle.runs[0].entries.len(), 1);
    assert_eq!(bundle.trained_count(), 1);

    let args = CodelangArgs::try_parse_from([
        "codelang",
        "-q",
        "--format",
        "json",
        "classify",
        arg(&output).as_str(),
        arg(&source).as_str(),
    ])
    .map_err(|e| CodelangError::other(e.to_string()))?;
    execute_command(args)?;

    let missing = dir.path().join("missing.go");
    let args = CodelangArgs::try_parse_from([
        "codelang",
        "-q",
        "classify",
        arg(&output).as_str(),
        arg(&missing).as_str(),
    ])
    .map_err(|e| CodelangError::other(e.to_string()))?;
    let err = execute_command(args).unwrap_err();
    assert!(matches!(err, CodelangError::Anyhow(_)));
    assert!(err.to_string().contains("missing.go"), "{err}");
    Ok(())
}

#[test]
fn cli_reports_missing_sample_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");
    let args = CodelangArgs::try_parse_from([
        "codelang",
        "-q",
        "train",
        arg(&dir.path().join("missing")).as_str(),
        "10",
        arg(&output).as_str(),
    ])
    .unwrap();
    let err = execute_command(args).unwrap_err();
    assert!(err.is_configuration());
    assert!(!output.exists());
}
