//! Exact cosine similarity and top-K ranking.
//!
//! Candidates are scanned linearly; there is no index.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use legal_embeddings::EmbeddingVector;

use crate::error::VectorError;

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Candidate identifier
    pub id: String,
    /// Cosine similarity in [-1, 1] (higher = more similar)
    pub score: f32,
}

impl SimilarityResult {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Cosine of the angle between `a` and `b`.
///
/// Returns 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &EmbeddingVector, b: &EmbeddingVector) -> Result<f32, VectorError> {
    cosine(a.values(), b.values())
}

fn cosine(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Rank `candidates` by similarity to `query`.
///
/// Scores below `threshold` are dropped. The rest are sorted best first and
/// truncated to `top_k`; equal scores keep their scan order.
pub fn find_similar<'a, I, K>(
    query: &EmbeddingVector,
    candidates: I,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<SimilarityResult>, VectorError>
where
    I: IntoIterator<Item = (K, &'a EmbeddingVector)>,
    K: Into<String>,
{
    let mut scanned = 0usize;
    let mut results = Vec::new();
    for (id, candidate) in candidates {
        scanned += 1;
        let score = cosine_similarity(query, candidate)?;
        if score >= threshold {
            results.push(SimilarityResult::new(id, score));
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);

    debug!(
        scanned,
        returned = results.len(),
        top_k,
        threshold,
        "Similarity search complete"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec())
    }

    #[test]
    fn test_self_similarity_is_one() {
        let a = v(&[0.3, -0.2, 0.9, 0.1]);
        let score = cosine_similarity(&a, &a).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors() {
        let score = cosine_similarity(&v(&[1.0, 2.0]), &v(&[-1.0, -2.0])).unwrap();
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let score = cosine_similarity(&v(&[1.0, 0.0]), &v(&[0.0, 1.0])).unwrap();
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        let vectors = [
            v(&[0.1, 0.2, 0.3]),
            v(&[-5.0, 0.0, 2.5]),
            v(&[1e-3, 1e3, -1.0]),
            v(&[7.0, 7.0, 7.0]),
        ];
        for a in &vectors {
            for b in &vectors {
                let score = cosine_similarity(a, b).unwrap();
                assert!((-1.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = v(&[0.0, 0.0, 0.0]);
        assert_eq!(cosine_similarity(&zero, &v(&[1.0, 2.0, 3.0])).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = cosine_similarity(&v(&[1.0, 0.0]), &v(&[1.0, 0.0, 0.0]));
        assert_eq!(
            result,
            Err(VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_top_k_and_threshold() {
        let query = v(&[1.0, 0.0]);
        let candidates = vec![
            ("far".to_string(), v(&[-1.0, 0.1])),
            ("best".to_string(), v(&[1.0, 0.0])),
            ("close".to_string(), v(&[1.0, 0.2])),
            ("side".to_string(), v(&[0.0, 1.0])),
            ("near".to_string(), v(&[1.0, 0.5])),
        ];

        let top = find_similar(&query, candidates.iter().map(|(id, e)| (id, e)), 2, -1.0).unwrap();
        let ids: Vec<_> = top.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["best", "close"]);

        let above = find_similar(&query, candidates.iter().map(|(id, e)| (id, e)), 10, 0.5).unwrap();
        assert_eq!(above.len(), 3);
        assert!(above.iter().all(|r| r.score >= 0.5));
        assert!(above.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_scan_order() {
        let query = v(&[1.0, 0.0]);
        let same = v(&[2.0, 0.0]);
        let candidates = [("first", &same), ("second", &same), ("third", &same)];

        let results = find_similar(&query, candidates, 3, 0.0).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[test]
    fn test_mismatched_candidate_fails_search() {
        let query = v(&[1.0, 0.0]);
        let bad = v(&[1.0, 0.0, 0.0]);
        let result = find_similar(&query, [("bad", &bad)], 5, 0.0);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
    }
}
