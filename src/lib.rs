//! Simple Bank - accounts, balances and atomic money transfers
//!
//! # Modules
//!
//! - [`ledger`] - Row types, the `Queries` capability and its backends
//! - [`transfer`] - Transaction coordinator and the transfer engine
//! - [`bank`] - Service facade used by the HTTP layer
//! - [`gateway`] - axum router, handlers and OpenAPI docs
//! - [`db`] - PostgreSQL pool setup
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`currency`] - Supported currencies

pub mod bank;
pub mod config;
pub mod currency;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use bank::{Bank, BankService};
pub use config::{AppConfig, DatabaseConfig, GatewayConfig, TransferConfig};
pub use ledger::{
    Account, AccountId, Entry, LedgerError, MemoryStore, PgStore, Queries, Store, Transaction,
    Transfer,
};
pub use transfer::{OverdraftPolicy, TransferEngine, TransferParams, TransferResult, TxCoordinator};
