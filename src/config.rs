use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CfmgError, Result};

/// Top-level configuration, read from `cfmg.toml` in the working directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Database connection string for the registry schema
    pub connection_string: Option<String>,

    /// Database driver: "postgres" or "mysql"
    pub driver: Option<String>,

    /// Table prefix substituted into every migration script
    pub table_prefix: Option<String>,

    /// Event dispatch configuration
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventsConfig {
    #[serde(default)]
    pub sinks: SinksConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SinksConfig {
    #[serde(default)]
    pub webhook: WebhookSinkConfig,

    #[serde(default)]
    pub redis: RedisSinkConfig,

    #[serde(default)]
    pub kafka: KafkaSinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookSinkConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: String,

    /// Shared secret; when non-empty the request body is HMAC-signed
    #[serde(default)]
    pub secret: String,

    /// Per-request timeout in milliseconds; 0 means the default (5000)
    #[serde(default)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSinkConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub dsn: String,

    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for RedisSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dsn: String::new(),
            channel: default_channel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSinkConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub brokers: Vec<String>,

    #[serde(default = "default_channel")]
    pub topic: String,
}

impl Default for KafkaSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: Vec::new(),
            topic: default_channel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total delivery attempts per sink
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each failure
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_channel() -> String {
    "cfmg-events".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from cfmg.toml in the current directory
    pub fn load_from_file() -> Result<Option<Self>> {
        Self::load_from_path(&PathBuf::from("cfmg.toml"))
    }

    /// Load configuration from an explicit path; a missing file is not an
    /// error, it just means defaults apply.
    pub fn load_from_path(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|err| CfmgError::ConfigLoad {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|err| CfmgError::ConfigLoad {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        Ok(Some(config))
    }
}
