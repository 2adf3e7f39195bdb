//! Similarity error types.

use thiserror::Error;

/// Errors that can occur while comparing vectors.
#[derive(Debug, Error, PartialEq)]
pub enum VectorError {
    /// Vectors of different lengths cannot be compared
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
