//! Simple Bank - HTTP service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│   Bank   │───▶│ Gateway  │
//! │  (YAML)  │    │(PG | mem)│    │(Transfer)│    │  (axum)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use simple_bank::bank::{Bank, BankService};
use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::ledger::{MemoryConfig, MemoryStore, PgStore};
use simple_bank::{gateway, logging};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = logging::init_logging(&config);

    tracing::info!(env = %env, version = env!("GIT_HASH"), "Starting Simple Bank");

    let bank: Arc<dyn BankService> = match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url, &config.database).await?;
            let store = PgStore::new(db.pool().clone());
            Arc::new(Bank::new("postgres", Arc::new(store), config.transfer.clone()))
        }
        None => {
            tracing::warn!("postgres_url not set, using the in-process store (data is not persisted)");
            let store = MemoryStore::with_config(MemoryConfig {
                max_connections: config.database.max_connections,
                acquire_timeout: Duration::from_millis(config.database.acquire_timeout_ms),
                ..MemoryConfig::default()
            });
            Arc::new(Bank::new("memory", Arc::new(store), config.transfer.clone()))
        }
    };

    gateway::run_server(&config.gateway, bank).await
}
