//! Provider lifecycle, switching and fallback.
//!
//! The manager owns at most one instance per [`ProviderType`], built lazily
//! and kept until [`EmbeddingManager::destroy`]. If a requested provider fails
//! to initialize, the mock provider is brought up and made active instead.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use legal_types::{ProviderType, Settings};

use crate::batch;
use crate::error::EmbeddingError;
use crate::progress::{ProgressEvent, ProgressReporter, ProgressStatus};
use crate::providers::{
    EmbeddingProvider, LocalModelProvider, MockProvider, ProviderStats, RemoteApiProvider,
};
use crate::vector::EmbeddingVector;

/// Owns embedding providers and routes calls to the active one.
///
/// Construct one per application and share it (e.g. behind an `Arc`).
pub struct EmbeddingManager {
    settings: Settings,
    providers: RwLock<HashMap<ProviderType, Arc<dyn EmbeddingProvider>>>,
    current: RwLock<Option<Arc<dyn EmbeddingProvider>>>,
    switch_lock: Mutex<()>,
    progress: ProgressReporter,
}

impl EmbeddingManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            providers: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            switch_lock: Mutex::new(()),
            progress: ProgressReporter::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Receive progress events from initialization and generation.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Make `requested` the active provider, initializing it if needed.
    ///
    /// Returns the type that actually became active, which is
    /// [`ProviderType::Mock`] when the requested provider failed to start.
    pub async fn switch_provider(&self, requested: ProviderType) -> Result<ProviderType, EmbeddingError> {
        let _guard = self.switch_lock.lock().await;
        let provider = self.activate(requested).await?;
        let active = provider.provider_type();
        *self.current.write().await = Some(provider);
        info!(requested = %requested, active = %active, "Active embedding provider set");
        Ok(active)
    }

    /// Active provider, initializing the configured default on first use.
    pub async fn current_provider(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        if let Some(provider) = self.current.read().await.clone() {
            return Ok(provider);
        }
        self.switch_provider(self.settings.default_provider).await?;
        self.current
            .read()
            .await
            .clone()
            .ok_or(EmbeddingError::NotInitialized(self.settings.default_provider))
    }

    /// Type of the active provider, if one has been activated.
    pub async fn provider_type(&self) -> Option<ProviderType> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|p| p.provider_type())
    }

    /// Embed one text (cache-aware).
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let provider = self.current_provider().await?;
        self.report_generation(provider.provider_type(), 1, provider.embed(text))
            .await
    }

    /// Embed texts in order, reusing cached vectors.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let provider = self.current_provider().await?;
        self.report_generation(
            provider.provider_type(),
            texts.len(),
            batch::embed_batch(provider.as_ref(), texts),
        )
        .await
    }

    /// Embed a set of documents keyed by ID.
    pub async fn embed_documents(
        &self,
        documents: &HashMap<String, String>,
    ) -> Result<HashMap<String, EmbeddingVector>, EmbeddingError> {
        let (ids, texts): (Vec<&String>, Vec<String>) = documents
            .iter()
            .map(|(id, text)| (id, text.clone()))
            .unzip();
        let vectors = self.embed_batch(&texts).await?;
        Ok(ids.into_iter().cloned().zip(vectors).collect())
    }

    /// Stats of the active provider, if one has been activated.
    pub async fn stats(&self) -> Option<ProviderStats> {
        self.current.read().await.as_ref().map(|p| p.stats())
    }

    /// Stats of every live provider.
    pub async fn all_stats(&self) -> Vec<ProviderStats> {
        let providers = self.providers.read().await;
        ProviderType::ALL
            .iter()
            .filter_map(|ty| providers.get(ty).map(|p| p.stats()))
            .collect()
    }

    /// Clear the cache of every live provider.
    pub async fn clear_cache(&self) {
        for provider in self.providers.read().await.values() {
            provider.clear_cache();
        }
        info!("Embedding caches cleared");
    }

    /// Tear down every live provider. The manager can be reused afterwards.
    pub async fn destroy(&self) {
        let _guard = self.switch_lock.lock().await;
        *self.current.write().await = None;
        let providers: Vec<_> = self.providers.write().await.drain().collect();
        for (ty, provider) in providers {
            provider.destroy().await;
            info!(provider = %ty, "Embedding provider destroyed");
        }
    }

    /// Wrap a generation call in `generate` stage progress events.
    async fn report_generation<T, F>(
        &self,
        provider: ProviderType,
        count: usize,
        fut: F,
    ) -> Result<T, EmbeddingError>
    where
        F: Future<Output = Result<T, EmbeddingError>>,
    {
        let stage = "generate";
        self.progress.emit(
            ProgressEvent::new(stage, ProgressStatus::Active, format!("Embedding {count} texts"))
                .with_details(serde_json::json!({
                    "provider": provider,
                    "count": count,
                })),
        );

        match fut.await {
            Ok(value) => {
                self.progress
                    .completed(stage, format!("Embedded {count} texts"));
                Ok(value)
            }
            Err(err) => {
                self.progress.error(stage, err.to_string());
                Err(err)
            }
        }
    }

    /// Initialize `requested`, falling back to the mock provider on failure.
    async fn activate(&self, requested: ProviderType) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let stage = "initialize";
        self.progress
            .active(stage, format!("Initializing {requested} provider"));

        let err = match self.initialize(requested).await {
            Ok(provider) => {
                self.progress
                    .completed(stage, format!("{requested} provider ready"));
                return Ok(provider);
            }
            Err(err) => err,
        };

        self.progress.emit(
            ProgressEvent::new(
                stage,
                ProgressStatus::Error,
                format!("{requested} provider failed to initialize"),
            )
            .with_details(serde_json::json!({
                "provider": requested,
                "error": err.to_string(),
            })),
        );

        if requested == ProviderType::Mock {
            return Err(err);
        }

        warn!(
            provider = %requested,
            error = %err,
            "Provider initialization failed, falling back to mock provider"
        );
        self.progress
            .active(stage, "Falling back to mock provider");

        match self.initialize(ProviderType::Mock).await {
            Ok(provider) => {
                self.progress
                    .completed(stage, "mock provider ready (fallback)");
                Ok(provider)
            }
            Err(fallback_err) => {
                self.progress.error(stage, fallback_err.to_string());
                Err(fallback_err)
            }
        }
    }

    async fn initialize(&self, ty: ProviderType) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let provider = self.instance(ty).await?;
        provider
            .state()
            .with_init_timeout(provider.initialize())
            .await?;
        Ok(provider)
    }

    /// Memoized provider construction.
    async fn instance(&self, ty: ProviderType) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        if let Some(provider) = self.providers.read().await.get(&ty) {
            return Ok(Arc::clone(provider));
        }

        let mut providers = self.providers.write().await;
        if let Some(provider) = providers.get(&ty) {
            return Ok(Arc::clone(provider));
        }
        let provider = self.build(ty)?;
        providers.insert(ty, Arc::clone(&provider));
        Ok(provider)
    }

    fn build(&self, ty: ProviderType) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let config = self.settings.provider(ty).clone();
        let provider: Arc<dyn EmbeddingProvider> = match ty {
            ProviderType::LocalModel => {
                Arc::new(LocalModelProvider::new(config, self.progress.clone()))
            }
            ProviderType::RemoteApi => Arc::new(RemoteApiProvider::new(config)?),
            ProviderType::Mock => Arc::new(MockProvider::new(
                config,
                Duration::from_millis(self.settings.mock_latency_ms),
            )),
        };
        Ok(provider)
    }
}
