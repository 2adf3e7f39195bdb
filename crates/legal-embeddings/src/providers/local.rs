//! In-process transformer model provider.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use legal_types::{ProviderConfig, ProviderType};

use super::{EmbeddingProvider, ProviderState};
use crate::candle::CandleEmbedder;
use crate::error::EmbeddingError;
use crate::model_files::ModelStore;
use crate::progress::ProgressReporter;
use crate::vector::EmbeddingVector;

/// Provider running a Candle BERT model on the local CPU.
///
/// The model is loaded once by `initialize`; later calls are no-ops until
/// `destroy` unloads it. Inference runs on tokio's blocking pool.
pub struct LocalModelProvider {
    state: ProviderState,
    store: ModelStore,
    progress: ProgressReporter,
    model: RwLock<Option<Arc<CandleEmbedder>>>,
    init_lock: Mutex<()>,
}

impl LocalModelProvider {
    /// Provider whose model files live in the user cache directory.
    pub fn new(config: ProviderConfig, progress: ProgressReporter) -> Self {
        let store = ModelStore::in_user_cache(config.model.clone());
        Self::with_store(config, store, progress)
    }

    pub fn with_store(config: ProviderConfig, store: ModelStore, progress: ProgressReporter) -> Self {
        Self {
            state: ProviderState::new(ProviderType::LocalModel, config),
            store,
            progress,
            model: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    fn init_error(reason: impl Into<String>) -> EmbeddingError {
        EmbeddingError::Initialization {
            provider: ProviderType::LocalModel,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalModelProvider {
    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        // Serialize concurrent initializers so the model loads once
        let _guard = self.init_lock.lock().await;
        if self.model.read().await.is_some() {
            return Ok(());
        }

        self.state
            .config()
            .validate()
            .map_err(|e| Self::init_error(e.to_string()))?;

        info!(repo = %self.store.repo_id, "Loading local embedding model");
        let store = self.store.clone();
        let progress = self.progress.clone();
        let embedder = tokio::task::spawn_blocking(move || CandleEmbedder::load(&store, &progress))
            .await
            .map_err(|e| Self::init_error(format!("model load task failed: {e}")))?
            .map_err(|e| Self::init_error(e.to_string()))?;

        let expected = self.state.config().dimensions;
        if embedder.dimensions() != expected {
            warn!(
                configured = expected,
                actual = embedder.dimensions(),
                "Local model dimensions differ from configuration"
            );
        }

        *self.model.write().await = Some(Arc::new(embedder));
        self.state.set_model_loaded(true);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.stats().model_loaded
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let model = self
            .model
            .read()
            .await
            .clone()
            .ok_or(EmbeddingError::NotInitialized(ProviderType::LocalModel))?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed_batch(&texts))
            .await
            .map_err(|e| EmbeddingError::Generation {
                provider: ProviderType::LocalModel,
                reason: format!("inference task failed: {e}"),
            })?
            .map_err(|e| EmbeddingError::Generation {
                provider: ProviderType::LocalModel,
                reason: e.to_string(),
            })
    }

    async fn destroy(&self) {
        let _guard = self.init_lock.lock().await;
        self.model.write().await.take();
        self.state.set_model_loaded(false);
        self.state.clear_cache();
    }
}
