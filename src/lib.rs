//! # codelang
//!
//! Programming language classification from token-frequency profiles.
//!
//! ## Features
//!
//! - Five interchangeable backends behind one [`classifier::Classifier`] trait
//! - Variance-based vocabulary selection shared by every backend
//! - Parallel training with per-backend failure reporting
//! - Checksummed binary model encoding and JSON model bundles

pub mod bundle;
pub mod classifier;
pub mod cli;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod distance;
pub mod error;
pub mod features;
pub mod tokenizer;
pub mod training;
pub mod util;
pub mod vocabulary;

pub mod prelude {
    pub use crate::classifier::{Backend, Classifier};
    pub use crate::config::TrainingConfig;
    pub use crate::corpus::SampleCorpus;
    pub use crate::error::{CodelangError, Result};
    pub use crate::features::FrequencyVector;
    pub use crate::tokenizer::{RegexTokenizer, Tokenizer};
    pub use crate::training::{CancellationToken, Trainer, TrainingReport};
    pub use crate::vocabulary::{Vocabulary, VocabularySelector};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
