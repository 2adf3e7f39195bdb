//! OpenAI-compatible remote embeddings API provider.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use legal_types::{ProviderConfig, ProviderType};

use super::{EmbeddingProvider, ProviderState};
use crate::error::EmbeddingError;
use crate::vector::EmbeddingVector;

/// Base URL used when the config does not name one.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Text embedded by `initialize` to validate the key and endpoint.
const VALIDATION_TEXT: &str = "test";

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Provider backed by a `POST {api_url}/embeddings` endpoint.
pub struct RemoteApiProvider {
    state: ProviderState,
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    initialized: AtomicBool,
}

impl RemoteApiProvider {
    /// Create the provider. No network traffic happens until `initialize`.
    pub fn new(config: ProviderConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::Initialization {
                provider: ProviderType::RemoteApi,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.to_string()));

        let base_url = config
            .api_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            state: ProviderState::new(ProviderType::RemoteApi, config),
            client,
            api_key,
            base_url,
            initialized: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generation_error(reason: impl Into<String>) -> EmbeddingError {
        EmbeddingError::Generation {
            provider: ProviderType::RemoteApi,
            reason: reason.into(),
        }
    }

    /// Make a single embeddings request.
    async fn request(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Self::generation_error("no API key configured"))?;

        let body = EmbeddingsRequest {
            model: &self.state.config().model,
            input: texts,
        };

        let url = format!("{}/embeddings", self.base_url);
        debug!(count = texts.len(), url = %url, "Requesting embeddings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout {
                        provider: ProviderType::RemoteApi,
                        seconds: self.state.config().timeout_secs,
                    }
                } else {
                    Self::generation_error(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::RateLimited {
                provider: ProviderType::RemoteApi,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::generation_error(format!("HTTP {status}: {body}")));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Self::generation_error(format!("invalid response body: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                provider: ProviderType::RemoteApi,
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }

        place_by_index(parsed.data)
    }
}

/// Put each returned vector in the slot its `index` names.
///
/// Indices must cover `0..data.len()` exactly once.
fn place_by_index(data: Vec<EmbeddingData>) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
    let len = data.len();
    let mut slots: Vec<Option<EmbeddingVector>> = vec![None; len];
    for item in data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            RemoteApiProvider::generation_error(format!(
                "response index {} out of range for {len} inputs",
                item.index
            ))
        })?;
        if slot.is_some() {
            return Err(RemoteApiProvider::generation_error(format!(
                "duplicate response index {}",
                item.index
            )));
        }
        *slot = Some(EmbeddingVector::new(item.embedding));
    }
    // Every slot is filled: len items, no duplicates, all in range
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl EmbeddingProvider for RemoteApiProvider {
    fn state(&self) -> &ProviderState {
        &self.state
    }

    /// Validate config and credentials by embedding a short test text.
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        if self.is_initialized() {
            return Ok(());
        }

        let init_error = |reason: String| EmbeddingError::Initialization {
            provider: ProviderType::RemoteApi,
            reason,
        };

        self.state
            .config()
            .validate()
            .map_err(|e| init_error(e.to_string()))?;

        if self.api_key.is_none() {
            return Err(init_error("no API key configured".to_string()));
        }

        let validation = self
            .request(&[VALIDATION_TEXT.to_string()])
            .await
            .map_err(|e| init_error(format!("validation request failed: {e}")))?;

        let dimensions = validation.first().map(|v| v.dimensions()).unwrap_or_default();
        info!(
            url = %self.base_url,
            model = %self.state.config().model,
            dimensions,
            "Remote embedding API validated"
        );

        self.initialized.store(true, Ordering::SeqCst);
        self.state.set_model_loaded(true);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if !self.is_initialized() {
            return Err(EmbeddingError::NotInitialized(ProviderType::RemoteApi));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    async fn destroy(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.state.set_model_loaded(false);
        self.state.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig::for_provider(ProviderType::RemoteApi)
            .with_api_key("sk-test")
            .with_api_url(server.uri())
    }

    fn embeddings_body(vectors: &[(usize, Vec<f32>)]) -> serde_json::Value {
        let data: Vec<_> = vectors
            .iter()
            .map(|(index, embedding)| {
                serde_json::json!({ "object": "embedding", "index": index, "embedding": embedding })
            })
            .collect();
        serde_json::json!({ "object": "list", "data": data, "model": "text-embedding-ada-002" })
    }

    #[test]
    fn test_default_base_url() {
        let provider =
            RemoteApiProvider::new(ProviderConfig::for_provider(ProviderType::RemoteApi)).unwrap();
        assert_eq!(provider.base_url(), DEFAULT_API_URL);

        let provider = RemoteApiProvider::new(
            ProviderConfig::for_provider(ProviderType::RemoteApi)
                .with_api_url("http://localhost:9999/v1/"),
        )
        .unwrap();
        assert_eq!(provider.base_url(), "http://localhost:9999/v1");
    }

    #[tokio::test]
    async fn test_initialize_without_key_fails_fast() {
        let provider =
            RemoteApiProvider::new(ProviderConfig::for_provider(ProviderType::RemoteApi)).unwrap();
        let result = provider.initialize().await;
        assert!(matches!(
            result,
            Err(EmbeddingError::Initialization {
                provider: ProviderType::RemoteApi,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_initialize_sends_validation_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(serde_json::json!({ "input": ["test"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0, 0.0])])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        provider.initialize().await.unwrap();
        assert!(provider.is_initialized());
        assert!(provider.stats().model_loaded);
    }

    #[tokio::test]
    async fn test_initialize_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Initialization { .. }));
        assert!(err.to_string().contains("401"));
        assert!(!provider.is_initialized());
    }

    #[tokio::test]
    async fn test_generate_batch_orders_by_index_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["test"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0, 0.0])])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["contrato", "despido"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[
                (1, vec![0.0, 2.0]),
                (0, vec![3.0, 4.0]),
            ])))
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        provider.initialize().await.unwrap();

        let vectors = provider
            .generate_batch(&["contrato".to_string(), "despido".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert!((vectors[0].values()[0] - 0.6).abs() < 1e-6);
        assert!((vectors[0].values()[1] - 0.8).abs() < 1e-6);
        assert!((vectors[1].values()[1] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["test"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0])])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["busy"] })))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        provider.initialize().await.unwrap();

        let err = provider.generate_batch(&["busy".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                provider: ProviderType::RemoteApi
            }
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["test"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0])])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0])])))
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        provider.initialize().await.unwrap();

        let err = provider
            .generate_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::BatchSizeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    async fn provider_answering(input: &[&str], body: serde_json::Value) -> (MockServer, RemoteApiProvider) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": ["test"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(&[(0, vec![1.0, 0.0])])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({ "input": input })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let provider = RemoteApiProvider::new(config(&server)).unwrap();
        provider.initialize().await.unwrap();
        (server, provider)
    }

    #[tokio::test]
    async fn test_duplicate_index_is_rejected() {
        let (_server, provider) = provider_answering(
            &["a", "b"],
            embeddings_body(&[(1, vec![0.0, 1.0]), (1, vec![1.0, 0.0])]),
        )
        .await;

        let err = provider
            .generate_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Generation {
                provider: ProviderType::RemoteApi,
                ..
            }
        ));
        assert!(err.to_string().contains("duplicate response index 1"));
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_rejected() {
        let (_server, provider) = provider_answering(
            &["a", "b"],
            embeddings_body(&[(0, vec![0.0, 1.0]), (2, vec![1.0, 0.0])]),
        )
        .await;

        let err = provider
            .generate_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Generation { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_rejected_response_is_not_cached() {
        let (_server, provider) = provider_answering(
            &["a", "b"],
            embeddings_body(&[(1, vec![0.0, 1.0]), (1, vec![1.0, 0.0])]),
        )
        .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        assert!(crate::batch::embed_batch(&provider, &texts).await.is_err());
        assert!(provider.state().cache().is_empty());
    }
}
