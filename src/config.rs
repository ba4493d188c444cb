use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::transfer::OverdraftPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Without it the service runs on the in-process store.
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Connection pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Transfer engine settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    #[serde(default)]
    pub overdraft: OverdraftPolicy,
    /// Deadline for one transfer transaction; 0 disables it
    #[serde(default = "default_transfer_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_transfer_timeout_ms() -> u64 {
    10_000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            overdraft: OverdraftPolicy::default(),
            timeout_ms: default_transfer_timeout_ms(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
