//! Gateway configuration, loadable from JSON or YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::async_pool::AsyncPoolConfig;
use crate::core::engine::EngineConfig;
use crate::core::recovery::RecoveryConfig;
use crate::nodes::national::NationalNodeConfig;

fn default_self_app_key() -> String {
    "self".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Guess from the file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub async_pool: AsyncPoolConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub national_node: NationalNodeConfig,
    /// Directory key of this node's own keypair.
    #[serde(default = "default_self_app_key")]
    pub self_app_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            async_pool: AsyncPoolConfig::default(),
            recovery: RecoveryConfig::default(),
            national_node: NationalNodeConfig::default(),
            self_app_key: default_self_app_key(),
        }
    }
}

impl GatewayConfig {
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: GatewayConfig = match format {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_saphyr::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.async_pool;
        if pool.max_workers < pool.core_workers {
            return Err(ConfigError::Invalid(format!(
                "asyncPool.maxWorkers ({}) must be >= coreWorkers ({})",
                pool.max_workers, pool.core_workers
            )));
        }
        if self.recovery.workers == 0 {
            return Err(ConfigError::Invalid(
                "recovery.workers must be greater than 0".into(),
            ));
        }
        if self.engine.lease_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "engine.leaseTimeoutSecs must be greater than 0".into(),
            ));
        }
        if self.self_app_key.trim().is_empty() {
            return Err(ConfigError::Invalid("selfAppKey must not be empty".into()));
        }
        Ok(())
    }
}
