//! Embedding provider trait and shared provider state.
//!
//! Every backend composes a [`ProviderState`] (config, cache, stats) and
//! implements [`EmbeddingProvider`]. The raw `generate_batch` primitive is
//! not cache-aware; `embed` and the batch orchestrator in [`crate::batch`]
//! layer the cache on top.

mod local;
mod mock;
mod remote;

pub use local::LocalModelProvider;
pub use mock::MockProvider;
pub use remote::{RemoteApiProvider, DEFAULT_API_URL};

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use legal_types::{ProviderConfig, ProviderType};

use crate::cache::{cache_key, EmbeddingCache};
use crate::error::EmbeddingError;
use crate::vector::EmbeddingVector;

/// Snapshot of a provider's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider_type: ProviderType,
    /// Vectors handed back to callers, cached or generated
    pub total_embeddings: u64,
    /// Vectors served from the cache
    pub cached_embeddings: u64,
    /// Calls made to the backend generation primitive
    pub backend_requests: u64,
    /// Running average of per-item generation time
    pub average_processing_time_ms: f64,
    pub model_loaded: bool,
}

impl ProviderStats {
    fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            total_embeddings: 0,
            cached_embeddings: 0,
            backend_requests: 0,
            average_processing_time_ms: 0.0,
            model_loaded: false,
        }
    }

    /// Fraction of returned vectors that came from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_embeddings == 0 {
            0.0
        } else {
            self.cached_embeddings as f64 / self.total_embeddings as f64
        }
    }
}

struct StatsCell {
    stats: ProviderStats,
    timing_samples: u64,
}

/// Config, cache and counters shared by every provider implementation.
pub struct ProviderState {
    provider_type: ProviderType,
    config: ProviderConfig,
    cache: EmbeddingCache,
    stats: Mutex<StatsCell>,
}

impl ProviderState {
    pub fn new(provider_type: ProviderType, config: ProviderConfig) -> Self {
        let cache = EmbeddingCache::from_config(&config);
        Self {
            provider_type,
            config,
            cache,
            stats: Mutex::new(StatsCell {
                stats: ProviderStats::new(provider_type),
                timing_samples: 0,
            }),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Cache key for a text under this provider and model.
    pub fn cache_key(&self, text: &str) -> String {
        cache_key(self.provider_type, &self.config.model, text)
    }

    /// Look up a text in the cache, counting a hit. Always misses when caching is disabled.
    pub fn cached(&self, text: &str) -> Option<EmbeddingVector> {
        if !self.config.cache_enabled {
            return None;
        }
        let vector = self.cache.get(&self.cache_key(text))?;
        trace!(provider = %self.provider_type, "Cache hit");
        let mut cell = self.lock_stats();
        cell.stats.total_embeddings += 1;
        cell.stats.cached_embeddings += 1;
        Some(vector)
    }

    /// Store a generated vector. No-op when caching is disabled.
    pub fn store(&self, text: &str, vector: EmbeddingVector) {
        if self.config.cache_enabled {
            self.cache.set(self.cache_key(text), vector);
        }
    }

    /// Record one backend call that produced `count` vectors in `elapsed`.
    ///
    /// Folds the per-item time into the running average:
    /// `avg = (avg * (n - 1) + per_item) / n` with `n` timing samples.
    pub fn record_generated(&self, count: usize, elapsed: Duration) {
        let mut cell = self.lock_stats();
        cell.stats.backend_requests += 1;
        cell.stats.total_embeddings += count as u64;
        if count == 0 {
            return;
        }
        cell.timing_samples += 1;
        let n = cell.timing_samples as f64;
        let per_item = elapsed.as_secs_f64() * 1000.0 / count as f64;
        let avg = cell.stats.average_processing_time_ms;
        cell.stats.average_processing_time_ms = (avg * (n - 1.0) + per_item) / n;
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.lock_stats().stats.model_loaded = loaded;
    }

    pub fn stats(&self) -> ProviderStats {
        self.lock_stats().stats.clone()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Run a backend future under this provider's timeout.
    pub async fn with_timeout<T, F>(&self, fut: F) -> Result<T, EmbeddingError>
    where
        F: Future<Output = Result<T, EmbeddingError>>,
    {
        let limit = self.config.timeout();
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EmbeddingError::Timeout {
                provider: self.provider_type,
                seconds: limit.as_secs(),
            })?
    }

    /// Run `initialize` under the initialization timeout.
    ///
    /// Expiry is reported as an initialization failure.
    pub async fn with_init_timeout<F>(&self, fut: F) -> Result<(), EmbeddingError>
    where
        F: Future<Output = Result<(), EmbeddingError>>,
    {
        let limit = self.config.init_timeout();
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EmbeddingError::Initialization {
                provider: self.provider_type,
                reason: format!("timed out after {}s", limit.as_secs()),
            })?
    }

    fn lock_stats(&self) -> MutexGuard<'_, StatsCell> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pluggable embedding backend.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Shared config, cache and stats.
    fn state(&self) -> &ProviderState;

    /// Bring the backend up. Must be idempotent.
    async fn initialize(&self) -> Result<(), EmbeddingError>;

    fn is_initialized(&self) -> bool;

    /// Raw backend call: one vector per text, in input order. Not cache-aware.
    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError>;

    /// Release backend resources and drop cached vectors.
    async fn destroy(&self);

    fn provider_type(&self) -> ProviderType {
        self.state().provider_type()
    }

    fn config(&self) -> &ProviderConfig {
        self.state().config()
    }

    fn dimensions(&self) -> usize {
        self.config().dimensions
    }

    /// Raw single-text call.
    async fn generate(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let mut vectors = self.generate_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            actual => Err(EmbeddingError::BatchSizeMismatch {
                provider: self.provider_type(),
                expected: 1,
                actual,
            }),
        }
    }

    /// Cache-aware single-text embedding.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let state = self.state();
        if let Some(vector) = state.cached(text) {
            return Ok(vector);
        }

        let start = Instant::now();
        let vector = state.with_timeout(self.generate(text)).await?;
        state.record_generated(1, start.elapsed());
        state.store(text, vector.clone());
        Ok(vector)
    }

    fn stats(&self) -> ProviderStats {
        self.state().stats()
    }

    fn clear_cache(&self) {
        self.state().clear_cache();
    }
}
