//! Command line argument parsing for the codelang CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::classifier::Backend;

/// codelang - Programming language classification from token frequencies
#[derive(Parser, Debug, Clone)]
#[command(name = "codelang")]
#[command(about = "Train, compare and apply programming language classifiers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct CodelangArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Training configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl CodelangArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train classifiers and write a model bundle
    Train(TrainArgs),

    /// Train at several vocabulary sizes into one bundle
    Sweep(SweepArgs),

    /// Classify source files with a model from a bundle
    Classify(ClassifyArgs),

    /// Measure the accuracy of every model in a bundle
    Evaluate(EvaluateArgs),

    /// List the available backends
    Backends,
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Sample directory with one subdirectory per language
    #[arg(value_name = "SAMPLE_DIR")]
    pub sample_dir: PathBuf,

    /// Maximum number of vocabulary tokens
    #[arg(value_name = "MAX_VOCAB")]
    pub max_vocab: usize,

    /// Output bundle path (JSON)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Backend to train (repeatable; default: all)
    #[arg(short, long = "backend", value_name = "NAME")]
    pub backends: Vec<Backend>,

    /// Labeled directory used to score the trained models
    #[arg(long, value_name = "DIR")]
    pub validation: Option<PathBuf>,

    /// Keep only the most accurate model
    #[arg(long)]
    pub best_only: bool,

    /// Number of training threads
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Arguments for a vocabulary size sweep
#[derive(Parser, Debug, Clone)]
pub struct SweepArgs {
    /// Sample directory with one subdirectory per language
    #[arg(value_name = "SAMPLE_DIR")]
    pub sample_dir: PathBuf,

    /// Output bundle path (JSON)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Vocabulary sizes (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub sizes: Vec<usize>,

    /// Backend to train (repeatable; default: all)
    #[arg(short, long = "backend", value_name = "NAME")]
    pub backends: Vec<Backend>,

    /// Number of training threads
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Arguments for classification
#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    /// Model bundle path
    #[arg(value_name = "BUNDLE")]
    pub bundle: PathBuf,

    /// Source files to classify
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Backend to use (default: first trained model)
    #[arg(short, long, value_name = "NAME")]
    pub backend: Option<Backend>,

    /// Vocabulary size of the run to use
    #[arg(long, value_name = "K")]
    pub vocab_size: Option<usize>,
}

/// Arguments for evaluation
#[derive(Parser, Debug, Clone)]
pub struct EvaluateArgs {
    /// Model bundle path
    #[arg(value_name = "BUNDLE")]
    pub bundle: PathBuf,

    /// Labeled sample directory
    #[arg(value_name = "SAMPLE_DIR")]
    pub sample_dir: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_command() {
        let args = CodelangArgs::try_parse_from([
            "codelang",
            "train",
            "samples",
            "100",
            "models.json",
            "--backend",
            "knn",
            "-b",
            "svm",
            "--validation",
            "holdout",
            "--best-only",
        ])
        .unwrap();

        if let Command::Train(train_args) = args.command {
            assert_eq!(train_args.sample_dir, PathBuf::from("samples"));
            assert_eq!(train_args.max_vocab, 100);
            assert_eq!(train_args.output, PathBuf::from("models.json"));
            assert_eq!(train_args.backends, vec![Backend::Knn, Backend::Svm]);
            assert_eq!(train_args.validation, Some(PathBuf::from("holdout")));
            assert!(train_args.best_only);
        } else {
            panic!("Expected Train command");
        }
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = CodelangArgs::try_parse_from([
            "codelang",
            "train",
            "samples",
            "100",
            "models.json",
            "--backend",
            "perceptron",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_sizes() {
        let args = CodelangArgs::try_parse_from([
            "codelang",
            "sweep",
            "samples",
            "models.json",
            "--sizes",
            "10,50,100",
        ])
        .unwrap();

        if let Command::Sweep(sweep_args) = args.command {
            assert_eq!(sweep_args.sizes, vec![10, 50, 100]);
            assert!(sweep_args.backends.is_empty());
        } else {
            panic!("Expected Sweep command");
        }
    }

    #[test]
    fn test_classify_command() {
        let args = CodelangArgs::try_parse_from([
            "codelang",
            "classify",
            "models.json",
            "main.go",
            "app.py",
            "--backend",
            "gaussbayes",
            "--vocab-size",
            "50",
        ])
        .unwrap();

        if let Command::Classify(classify_args) = args.command {
            assert_eq!(classify_args.files.len(), 2);
            assert_eq!(classify_args.backend, Some(Backend::GaussBayes));
            assert_eq!(classify_args.vocab_size, Some(50));
        } else {
            panic!("Expected Classify command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = CodelangArgs::try_parse_from(["codelang", "backends"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = CodelangArgs::try_parse_from(["codelang", "-vv", "backends"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = CodelangArgs::try_parse_from(["codelang", "--quiet", "backends"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            CodelangArgs::try_parse_from(["codelang", "--format", "json", "backends"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
