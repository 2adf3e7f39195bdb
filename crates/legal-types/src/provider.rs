//! Provider identity and per-provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default number of texts sent to a backend in one request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default cache lifetime: seven days.
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default per-call timeout for provider operations.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default limit on provider initialization, which may include a model download.
pub const DEFAULT_INIT_TIMEOUT_SECS: u64 = 300;

/// Closed set of embedding backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// In-process transformer model
    LocalModel,
    /// OpenAI-compatible HTTP embeddings API
    RemoteApi,
    /// Deterministic hash-seeded vectors; the fallback of last resort
    Mock,
}

impl ProviderType {
    /// All provider types, in declaration order.
    pub const ALL: [ProviderType; 3] = [
        ProviderType::LocalModel,
        ProviderType::RemoteApi,
        ProviderType::Mock,
    ];

    /// Stable identifier used in cache keys and config sections.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::LocalModel => "local_model",
            ProviderType::RemoteApi => "remote_api",
            ProviderType::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_model" | "local" => Ok(ProviderType::LocalModel),
            "remote_api" | "remote" | "api" | "openai" => Ok(ProviderType::RemoteApi),
            "mock" => Ok(ProviderType::Mock),
            other => Err(ConfigError::Invalid(format!(
                "unknown provider type: {other}"
            ))),
        }
    }
}

/// Configuration for a single embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Model identifier understood by the backend
    pub model: String,

    /// Output dimensionality of the model
    pub dimensions: usize,

    /// Maximum texts per backend request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Whether generated vectors are cached
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Cache entry lifetime in seconds
    #[serde(default = "default_cache_expiration_secs")]
    pub cache_expiration_secs: u64,

    /// Optional LRU cap on cache entries. `None` leaves the cache unbounded.
    #[serde(default)]
    pub max_cache_entries: Option<usize>,

    /// Number of batch chunks dispatched at once (1 = sequential)
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Initialization timeout in seconds
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,

    /// API key (remote providers only)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (remote providers only)
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_expiration_secs() -> u64 {
    DEFAULT_CACHE_EXPIRATION_SECS
}

fn default_max_concurrent_chunks() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_init_timeout_secs() -> u64 {
    DEFAULT_INIT_TIMEOUT_SECS
}

/// Whole seconds, rounding any fractional part up.
fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

impl ProviderConfig {
    /// Create a config with the given model and dimensions and default everything else.
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
            batch_size: default_batch_size(),
            cache_enabled: default_cache_enabled(),
            cache_expiration_secs: default_cache_expiration_secs(),
            max_cache_entries: None,
            max_concurrent_chunks: default_max_concurrent_chunks(),
            timeout_secs: default_timeout_secs(),
            init_timeout_secs: default_init_timeout_secs(),
            api_key: None,
            api_url: None,
        }
    }

    /// Built-in defaults for a provider type.
    pub fn for_provider(provider: ProviderType) -> Self {
        match provider {
            ProviderType::LocalModel => Self::new("sentence-transformers/all-MiniLM-L6-v2", 384),
            ProviderType::RemoteApi => Self::new("text-embedding-ada-002", 1536),
            ProviderType::Mock => Self::new("mock-embedding", 384),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration_secs = expiration.as_secs();
        self
    }

    pub fn with_max_cache_entries(mut self, max: usize) -> Self {
        self.max_cache_entries = Some(max);
        self
    }

    pub fn with_max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n;
        self
    }

    /// Set the per-call timeout.
    ///
    /// Timeouts have whole-second resolution: a fractional duration rounds
    /// up (250ms becomes 1s). A zero duration fails `validate`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = ceil_secs(timeout);
        self
    }

    /// Set the initialization timeout. Rounds up like [`Self::with_timeout`].
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout_secs = ceil_secs(timeout);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Cache entry lifetime.
    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Limit on `initialize`.
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.dimensions == 0 {
            return Err(ConfigError::Invalid("dimensions must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".to_string()));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_chunks must be > 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        if self.init_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "init_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_cache_entries == Some(0) {
            return Err(ConfigError::Invalid(
                "max_cache_entries must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
