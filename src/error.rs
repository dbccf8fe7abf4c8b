//! Error types for the codelang library.
//!
//! All fallible operations return [`CodelangError`]. The variants follow the
//! three failure classes of a training run:
//!
//! - [`CodelangError::Configuration`] is raised before any work starts
//!   (invalid vocabulary size, empty corpus, unknown backend).
//! - [`CodelangError::Training`] is attached to a single backend and never
//!   aborts the rest of a run.
//! - [`CodelangError::Decode`] is returned by a backend decoder when the
//!   persisted bytes are malformed.
//!
//! # Examples
//!
//! ```
//! use codelang::error::{CodelangError, Result};
//!
//! fn check_size(k: usize) -> Result<()> {
//!     if k == 0 {
//!         return Err(CodelangError::configuration("vocabulary size must be at least 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_size(0).is_err());
//! ```

use std::io;

use thiserror::Error;

use crate::classifier::Backend;

/// The main error type for codelang operations.
#[derive(Error, Debug)]
pub enum CodelangError {
    /// I/O errors (sample loading, bundle files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration, detected before training starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single backend failed to produce a classifier
    #[error("Training failed for {backend}: {message}")]
    Training { backend: Backend, message: String },

    /// Persisted model bytes do not match the expected layout
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Error carrying context from a failed external operation
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with CodelangError.
pub type Result<T> = std::result::Result<T, CodelangError>;

impl CodelangError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CodelangError::Configuration(msg.into())
    }

    /// Create a new training error for the given backend.
    pub fn training<S: Into<String>>(backend: Backend, msg: S) -> Self {
        CodelangError::Training {
            backend,
            message: msg.into(),
        }
    }

    /// Create a new decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        CodelangError::Decode(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        CodelangError::Other(msg.into())
    }

    /// Whether this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CodelangError::Configuration(_))
    }

    /// Whether this error is a decode error.
    pub fn is_decode(&self) -> bool {
        matches!(self, CodelangError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = CodelangError::configuration("vocabulary size must be at least 1");
        assert_eq!(
            error.to_string(),
            "Configuration error: vocabulary size must be at least 1"
        );
        assert!(error.is_configuration());

        let error = CodelangError::decode("bad magic");
        assert_eq!(error.to_string(), "Decode error: bad magic");
        assert!(error.is_decode());

        let error = CodelangError::training(Backend::Svm, "diverged");
        assert_eq!(error.to_string(), "Training failed for svm: diverged");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = CodelangError::from(io_error);

        match error {
            CodelangError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_anyhow_context_is_kept() {
        use anyhow::Context;

        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "File not found"));
        let error: CodelangError = result.context("failed to read main.go").unwrap_err().into();
        assert!(matches!(error, CodelangError::Anyhow(_)));
        assert_eq!(error.to_string(), "failed to read main.go: File not found");
    }
}
