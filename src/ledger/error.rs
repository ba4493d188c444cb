//! Ledger Error Types
//!
//! One error enum flows from the store through the transaction coordinator
//! and the transfer engine up to the HTTP layer, unchanged.

use thiserror::Error;

use super::models::AccountId;

/// Ledger error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Caller Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: String,
        actual: String,
    },

    #[error("Insufficient funds in account {account_id}: balance would be {balance}")]
    InsufficientFunds { account_id: AccountId, balance: i64 },

    // === System Errors ===
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transfer timed out after {0}ms")]
    Timeout(u64),

    /// The unit of work failed and so did the rollback issued for it.
    #[error("tx err: {cause}, rollback err: {rollback}")]
    Combined {
        cause: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn account_not_found(id: AccountId) -> Self {
        LedgerError::NotFound(format!("account {}", id))
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Connection(_) => "CONNECTION_ERROR",
            LedgerError::Commit(_) => "COMMIT_ERROR",
            LedgerError::Store(_) => "STORE_ERROR",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::Combined { .. } => "COMBINED_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(_) | LedgerError::CurrencyMismatch { .. } => 400,
            LedgerError::NotFound(_) => 404,
            LedgerError::InsufficientFunds { .. } => 422,
            LedgerError::Connection(_) => 503,
            LedgerError::Timeout(_) => 504,
            LedgerError::Commit(_) | LedgerError::Store(_) | LedgerError::Combined { .. } => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => LedgerError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => LedgerError::Connection(e.to_string()),
            other => LedgerError::Store(other.to_string()),
        }
    }
}
