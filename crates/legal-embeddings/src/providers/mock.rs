//! Deterministic mock provider for tests and as the fallback of last resort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use legal_types::{ProviderConfig, ProviderType};

use super::{EmbeddingProvider, ProviderState};
use crate::cache::string_hash;
use crate::error::EmbeddingError;
use crate::vector::EmbeddingVector;

/// Mock provider that derives vectors from a hash of the text.
///
/// The same text always yields the same vector. Each backend call sleeps for
/// a small artificial latency so timing-dependent callers see real awaits.
pub struct MockProvider {
    state: ProviderState,
    latency: Duration,
    initialized: AtomicBool,
}

impl MockProvider {
    pub fn new(config: ProviderConfig, latency: Duration) -> Self {
        Self {
            state: ProviderState::new(ProviderType::Mock, config),
            latency,
            initialized: AtomicBool::new(false),
        }
    }

    /// Vector for a text, without latency or caching.
    pub fn vector_for(&self, text: &str) -> EmbeddingVector {
        mock_vector(text, self.state.config().dimensions)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(
            ProviderConfig::for_provider(ProviderType::Mock),
            Duration::from_millis(10),
        )
    }
}

/// Seed a PRNG from the text hash and draw a normalized vector.
pub(crate) fn mock_vector(text: &str, dimensions: usize) -> EmbeddingVector {
    let seed = string_hash(text) as u32 as u64;
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..dimensions)
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    EmbeddingVector::new(values)
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.state
            .config()
            .validate()
            .map_err(|e| EmbeddingError::Initialization {
                provider: ProviderType::Mock,
                reason: e.to_string(),
            })?;

        if !self.initialized.swap(true, Ordering::SeqCst) {
            debug!(
                dimensions = self.state.config().dimensions,
                "Mock embedding provider ready"
            );
        }
        self.state.set_model_loaded(true);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if !self.is_initialized() {
            return Err(EmbeddingError::NotInitialized(ProviderType::Mock));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    async fn destroy(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.state.set_model_loaded(false);
        self.state.clear_cache();
    }
}
