//! Cache-aware batch orchestration.
//!
//! Splits a batch into cache hits and misses, sends the misses to the
//! provider in chunks of at most `batch_size`, and reassembles the results
//! in input order. Chunks run one at a time unless `max_concurrent_chunks`
//! allows more; results are always written back by original index.

use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::EmbeddingError;
use crate::providers::EmbeddingProvider;
use crate::vector::EmbeddingVector;

/// Embed `texts` through `provider`, serving what it can from the cache.
///
/// The i-th output corresponds to the i-th input. Any chunk failure fails
/// the whole call; vectors from chunks that already succeeded stay cached.
pub async fn embed_batch<P>(provider: &P, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError>
where
    P: EmbeddingProvider + ?Sized,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let state = provider.state();
    let config = state.config();

    let mut results: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];
    let mut misses: Vec<(usize, &String)> = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        match state.cached(text) {
            Some(vector) => results[i] = Some(vector),
            None => misses.push((i, text)),
        }
    }

    debug!(
        provider = %provider.provider_type(),
        total = texts.len(),
        cached = texts.len() - misses.len(),
        misses = misses.len(),
        "Batch cache lookup"
    );

    let chunk_results: Vec<_> = stream::iter(misses.chunks(config.batch_size.max(1)))
        .map(|chunk| async move {
            let inputs: Vec<String> = chunk.iter().map(|(_, text)| (*text).clone()).collect();
            let start = Instant::now();
            let vectors = state.with_timeout(provider.generate_batch(&inputs)).await?;
            if vectors.len() != inputs.len() {
                return Err(EmbeddingError::BatchSizeMismatch {
                    provider: provider.provider_type(),
                    expected: inputs.len(),
                    actual: vectors.len(),
                });
            }
            state.record_generated(vectors.len(), start.elapsed());
            for (text, vector) in inputs.iter().zip(&vectors) {
                state.store(text, vector.clone());
            }
            Ok::<_, EmbeddingError>((chunk, vectors))
        })
        .buffered(config.max_concurrent_chunks.max(1))
        .try_collect()
        .await?;

    for (chunk, vectors) in chunk_results {
        for ((index, _), vector) in chunk.iter().zip(vectors) {
            results[*index] = Some(vector);
        }
    }

    let filled = results.iter().filter(|r| r.is_some()).count();
    if filled != texts.len() {
        return Err(EmbeddingError::BatchSizeMismatch {
            provider: provider.provider_type(),
            expected: texts.len(),
            actual: filled,
        });
    }
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use legal_types::{ProviderConfig, ProviderType};
    use std::time::Duration;

    async fn mock(batch_size: usize) -> MockProvider {
        let provider = MockProvider::new(
            ProviderConfig::for_provider(ProviderType::Mock)
                .with_batch_size(batch_size)
                .with_max_concurrent_chunks(1),
            Duration::ZERO,
        );
        provider.initialize().await.unwrap();
        provider
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_backend_call() {
        let provider = mock(50).await;
        let out = embed_batch(&provider, &[]).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(provider.stats().backend_requests, 0);
    }

    #[tokio::test]
    async fn test_partial_cache_hits_preserve_order() {
        let provider = mock(50).await;
        let cached_b = provider.embed("b").await.unwrap();

        let out = embed_batch(&provider, &texts(&["a", "b", "c"])).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], provider.vector_for("a"));
        assert_eq!(out[1], cached_b);
        assert_eq!(out[2], provider.vector_for("c"));

        let stats = provider.stats();
        // One call for "b", one chunk for ["a", "c"]
        assert_eq!(stats.backend_requests, 2);
        assert_eq!(stats.cached_embeddings, 1);
    }

    #[tokio::test]
    async fn test_misses_are_chunked() {
        let provider = mock(2).await;
        let input = texts(&["uno", "dos", "tres", "cuatro", "cinco"]);

        let out = embed_batch(&provider, &input).await.unwrap();

        assert_eq!(out.len(), 5);
        for (text, vector) in input.iter().zip(&out) {
            assert_eq!(vector, &provider.vector_for(text));
        }
        // ceil(5 / 2) chunks
        assert_eq!(provider.stats().backend_requests, 3);
        assert_eq!(provider.state().cache().len(), 5);
    }

    #[tokio::test]
    async fn test_second_batch_served_from_cache() {
        let provider = mock(50).await;
        let input = texts(&["contrato", "despido"]);

        let first = embed_batch(&provider, &input).await.unwrap();
        let second = embed_batch(&provider, &input).await.unwrap();

        assert_eq!(first, second);
        let stats = provider.stats();
        assert_eq!(stats.backend_requests, 1);
        assert_eq!(stats.cached_embeddings, 2);
        assert_eq!(stats.total_embeddings, 4);
    }

    #[tokio::test]
    async fn test_concurrent_chunks_keep_order() {
        let provider = MockProvider::new(
            ProviderConfig::for_provider(ProviderType::Mock)
                .with_batch_size(1)
                .with_max_concurrent_chunks(4),
            Duration::from_millis(1),
        );
        provider.initialize().await.unwrap();

        let input: Vec<String> = (0..12).map(|i| format!("articulo {i}")).collect();
        let out = embed_batch(&provider, &input).await.unwrap();

        for (text, vector) in input.iter().zip(&out) {
            assert_eq!(vector, &provider.vector_for(text));
        }
        assert_eq!(provider.stats().backend_requests, 12);
    }

    #[tokio::test]
    async fn test_backend_failure_fails_whole_batch() {
        let provider = MockProvider::new(
            ProviderConfig::for_provider(ProviderType::Mock),
            Duration::ZERO,
        );
        // Never initialized, so the backend rejects every chunk
        let result = embed_batch(&provider, &texts(&["a", "b"])).await;
        assert!(matches!(
            result,
            Err(EmbeddingError::NotInitialized(ProviderType::Mock))
        ));
    }
}
