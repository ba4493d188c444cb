//! Money transfers
//!
//! # Architecture
//!
//! ```text
//! TransferEngine ──▶ TxCoordinator ──▶ Store::begin ──▶ Queries (in tx)
//!   validate          commit / rollback   PgStore | MemoryStore
//!   lock order
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All-or-nothing**: transfer row, both entries and both balance deltas
//!    commit together or not at all
//! 2. **Total lock order**: balance rows are locked by ascending account id
//! 3. **No swallowed errors**: store errors reach the caller unchanged; a
//!    failed rollback is reported together with its cause
//! 4. **No retries, no dedup**: every call is a new transfer

pub mod coordinator;
pub mod engine;
pub mod types;

pub use coordinator::TxCoordinator;
pub use engine::TransferEngine;
pub use types::{OverdraftPolicy, TransferParams, TransferResult};
