//! # legal-embeddings
//!
//! Pluggable embedding generation for legal documents.
//!
//! Three interchangeable backends sit behind the [`EmbeddingProvider`] trait:
//! an in-process Candle model, an OpenAI-compatible HTTP API, and a
//! deterministic mock. [`EmbeddingManager`] picks one, falls back to the mock
//! when initialization fails, and routes every call through a per-provider
//! cache.
//!
//! ## Features
//! - Local inference via Candle (all-MiniLM-L6-v2, 384 dimensions)
//! - Remote embeddings via any `/embeddings` endpoint
//! - Time-expiring vector cache keyed by provider, model and text
//! - Order-preserving batch embedding with chunking
//! - Progress events over a broadcast channel

pub mod batch;
pub mod cache;
pub mod candle;
pub mod error;
pub mod manager;
pub mod model_files;
pub mod progress;
pub mod providers;
pub mod vector;

pub use batch::embed_batch;
pub use cache::{cache_key, string_hash, EmbeddingCache};
pub use crate::candle::CandleEmbedder;
pub use error::EmbeddingError;
pub use manager::EmbeddingManager;
pub use model_files::{ModelPaths, ModelStore, MODEL_FILES};
pub use progress::{ProgressEvent, ProgressReporter, ProgressStatus};
pub use providers::{
    EmbeddingProvider, LocalModelProvider, MockProvider, ProviderState, ProviderStats,
    RemoteApiProvider, DEFAULT_API_URL,
};
pub use vector::{magnitude, normalize, EmbeddingVector};

pub use legal_types::{ProviderConfig, ProviderType, Settings};
