//! Embedding error types.

use legal_types::{ConfigError, ProviderType};
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider could not be brought up (model load, bad key, unreachable endpoint)
    #[error("Failed to initialize {provider} provider: {reason}")]
    Initialization {
        provider: ProviderType,
        reason: String,
    },

    /// Backend failed while generating vectors
    #[error("{provider} provider failed to generate embeddings: {reason}")]
    Generation {
        provider: ProviderType,
        reason: String,
    },

    /// Backend rejected the request with HTTP 429
    #[error("{provider} provider rate limit exceeded")]
    RateLimited { provider: ProviderType },

    /// Call exceeded the configured timeout
    #[error("{provider} provider timed out after {seconds}s")]
    Timeout { provider: ProviderType, seconds: u64 },

    /// Generation was requested before `initialize` succeeded
    #[error("{0} provider is not initialized")]
    NotInitialized(ProviderType),

    /// Backend returned a different number of vectors than requested
    #[error("{provider} provider returned {actual} embeddings for {expected} texts")]
    BatchSizeMismatch {
        provider: ProviderType,
        expected: usize,
        actual: usize,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file not found or unreadable
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// Provider the error originated from, when known.
    pub fn provider(&self) -> Option<ProviderType> {
        match self {
            EmbeddingError::Initialization { provider, .. }
            | EmbeddingError::Generation { provider, .. }
            | EmbeddingError::RateLimited { provider }
            | EmbeddingError::Timeout { provider, .. }
            | EmbeddingError::BatchSizeMismatch { provider, .. } => Some(*provider),
            EmbeddingError::NotInitialized(provider) => Some(*provider),
            _ => None,
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::RateLimited { .. } | EmbeddingError::Timeout { .. }
        )
    }
}
