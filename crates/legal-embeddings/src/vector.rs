//! Embedding vector value type.

use serde::{Deserialize, Serialize};

/// Dense embedding vector.
///
/// `dimensions` always equals `values.len()`; both are derived from the same
/// data at construction. Serializes as a plain array of floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct EmbeddingVector {
    values: Vec<f32>,
    dimensions: usize,
}

impl EmbeddingVector {
    /// Create a vector, L2-normalizing the values.
    pub fn new(values: Vec<f32>) -> Self {
        Self::from_normalized(normalize(values))
    }

    /// Create a vector from values that are already normalized (or must stay raw).
    pub fn from_normalized(values: Vec<f32>) -> Self {
        let dimensions = values.len();
        Self { values, dimensions }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Euclidean norm.
    pub fn magnitude(&self) -> f32 {
        magnitude(&self.values)
    }

    /// True if every component is zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self::from_normalized(values)
    }
}

impl From<EmbeddingVector> for Vec<f32> {
    fn from(vector: EmbeddingVector) -> Self {
        vector.values
    }
}

/// Euclidean norm of a slice.
pub fn magnitude(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide every component by the Euclidean norm.
///
/// A zero-norm input is returned unchanged.
pub fn normalize(values: Vec<f32>) -> Vec<f32> {
    let norm = magnitude(&values);
    if norm > 0.0 {
        values.into_iter().map(|x| x / norm).collect()
    } else {
        values
    }
}
