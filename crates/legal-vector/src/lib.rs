//! # legal-vector
//!
//! Similarity ranking for legal document embeddings.
//!
//! Scores are exact cosine similarities computed by a linear scan, which is
//! enough for the document counts a single case file holds.

pub mod error;
pub mod similarity;

pub use error::VectorError;
pub use similarity::{cosine_similarity, find_similar, SimilarityResult};

/// Same as [`cosine_similarity`].
pub use similarity::cosine_similarity as calculate_similarity;
