//! # legal-types
//!
//! Shared types for the legal embedding core.
//!
//! - `ProviderType`: closed set of embedding backends
//! - `ProviderConfig`: per-provider model, batching, cache and endpoint settings
//! - `Settings`: layered configuration (defaults, file, environment)

pub mod config;
pub mod error;
pub mod provider;

pub use config::{ProvidersSettings, Settings, APP_NAME, ENV_PREFIX};
pub use error::ConfigError;
pub use provider::{
    ProviderConfig, ProviderType, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_EXPIRATION_SECS,
    DEFAULT_INIT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
