//! Error types for the `rass-core` crate.

use thiserror::Error;

/// Errors that can occur in backend operations.
#[derive(Debug, Error)]
pub enum RassError {
    /// The vectorizer could not produce an embedding for a text.
    #[error("Vectorization error ({vectorizer}): {message}")]
    Vectorization {
        /// The vectorizer that produced the error.
        vectorizer: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in a storage or search backend.
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// No document is stored under the requested id.
    #[error("Document with id {0} not found")]
    NotFound(String),

    /// A stored vector does not have the dimension of the query vector.
    ///
    /// This indicates a corrupted store or a vectorizer configured with a
    /// different dimension than the one used at embed time.
    #[error("Vector dimension mismatch for document '{id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The document carrying the mismatched vector.
        id: String,
        /// The dimension of the query vector.
        expected: usize,
        /// The dimension of the stored vector.
        actual: usize,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RassError {
    /// Returns `true` if this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RassError::NotFound(_))
    }
}

/// A convenience result type for backend operations.
pub type Result<T> = std::result::Result<T, RassError>;
