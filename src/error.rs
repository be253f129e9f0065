//! Error types for the evaluation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while evaluating a search backend.
///
/// Only dataset-structure and configuration errors abort a run. Backend and
/// computation errors are contained per query and surface as zero-valued
/// statistics rows.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A dataset row is missing a field every query depends on. Fatal:
    /// raised before any query is dispatched.
    #[error("malformed dataset: row {row} is missing required field '{field}'")]
    MalformedDataset { row: usize, field: String },

    /// A single search call failed (transport, protocol, backend-side).
    #[error("search backend error: {0}")]
    Backend(String),

    /// Ranking values were unusable for metric computation.
    #[error("metric computation error: {0}")]
    Computation(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a backend error from any displayable cause.
    pub fn backend(cause: impl std::fmt::Display) -> Self {
        Self::Backend(cause.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}
