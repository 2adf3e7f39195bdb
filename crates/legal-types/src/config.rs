//! Layered configuration for the embedding core.
//!
//! Precedence (later wins): built-in defaults -> ~/.config/legal-embed/config.toml
//! -> CLI-specified file -> LEGAL_EMBED_* environment variables -> CLI flags.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::provider::{ProviderConfig, ProviderType};

/// Application name used for config and cache directories.
pub const APP_NAME: &str = "legal-embed";

/// Environment variable prefix (`LEGAL_EMBED_PROVIDERS__REMOTE_API__API_KEY`, ...).
pub const ENV_PREFIX: &str = "LEGAL_EMBED";

/// Per-type provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvidersSettings {
    #[serde(default = "default_local_model")]
    pub local_model: ProviderConfig,

    #[serde(default = "default_remote_api")]
    pub remote_api: ProviderConfig,

    #[serde(default = "default_mock")]
    pub mock: ProviderConfig,
}

fn default_local_model() -> ProviderConfig {
    ProviderConfig::for_provider(ProviderType::LocalModel)
}

fn default_remote_api() -> ProviderConfig {
    ProviderConfig::for_provider(ProviderType::RemoteApi)
}

fn default_mock() -> ProviderConfig {
    ProviderConfig::for_provider(ProviderType::Mock)
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            local_model: default_local_model(),
            remote_api: default_remote_api(),
            mock: default_mock(),
        }
    }
}

impl ProvidersSettings {
    /// Configuration for a provider type.
    pub fn get(&self, provider: ProviderType) -> &ProviderConfig {
        match provider {
            ProviderType::LocalModel => &self.local_model,
            ProviderType::RemoteApi => &self.remote_api,
            ProviderType::Mock => &self.mock,
        }
    }

    /// Mutable configuration for a provider type.
    pub fn get_mut(&mut self, provider: ProviderType) -> &mut ProviderConfig {
        match provider {
            ProviderType::LocalModel => &mut self.local_model,
            ProviderType::RemoteApi => &mut self.remote_api,
            ProviderType::Mock => &mut self.mock,
        }
    }
}

/// Main settings for the embedding core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Provider activated on first use
    #[serde(default = "default_provider")]
    pub default_provider: ProviderType,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Artificial latency added by the mock provider, in milliseconds
    #[serde(default = "default_mock_latency_ms")]
    pub mock_latency_ms: u64,

    /// Per-provider configuration
    #[serde(default)]
    pub providers: ProvidersSettings,
}

fn default_provider() -> ProviderType {
    ProviderType::LocalModel
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mock_latency_ms() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            log_level: default_log_level(),
            mock_latency_ms: default_mock_latency_ms(),
            providers: ProvidersSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/legal-embed/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (LEGAL_EMBED_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("default_provider", default_provider().as_str())?
            .set_default("log_level", default_log_level())?
            .set_default("mock_latency_ms", default_mock_latency_ms() as i64)?;

        // Model and dimensions differ per provider, so a partially specified
        // provider section still needs its type-specific defaults.
        for provider in ProviderType::ALL {
            let defaults = ProviderConfig::for_provider(provider);
            builder = builder
                .set_default(format!("providers.{provider}.model"), defaults.model)?
                .set_default(
                    format!("providers.{provider}.dimensions"),
                    defaults.dimensions as i64,
                )?;
        }

        builder = builder
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every provider section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in ProviderType::ALL {
            self.providers
                .get(provider)
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("providers.{provider}: {e}")))?;
        }
        Ok(())
    }

    /// Configuration for a provider type.
    pub fn provider(&self, provider: ProviderType) -> &ProviderConfig {
        self.providers.get(provider)
    }
}
