//! Ledger Store
//!
//! Accounts, entries and transfers behind one [`Queries`] capability, with two
//! backends:
//! - [`PgStore`]: PostgreSQL via sqlx (production)
//! - [`MemoryStore`]: in-process, row-locked, instrumented (tests, local runs)

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;

pub use error::LedgerError;
pub use memory::{LedgerCounts, LockEvent, MemoryConfig, MemorySession, MemoryStore};
pub use models::{
    Account, AccountId, CreateAccountParams, CreateTransferParams, Entry, ListParams, Transfer,
};
pub use postgres::{PgConn, PgQueries, PgStore, PgTx};
pub use queries::{Queries, Store, Transaction};
