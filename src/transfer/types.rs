//! Transfer request/result types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{Account, AccountId, Entry, LedgerError, Transfer};

/// Transfer request as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Minor currency units, must be positive
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Reject requests no store could accept.
    ///
    /// Self-transfers pass: they produce a net-zero pair of entries.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= 0 {
            return Err(LedgerError::Validation(format!(
                "amount must be greater than zero, got {}",
                self.amount
            )));
        }
        if self.from_account_id < 1 || self.to_account_id < 1 {
            return Err(LedgerError::Validation(format!(
                "account ids must be positive, got {} -> {}",
                self.from_account_id, self.to_account_id
            )));
        }
        Ok(())
    }
}

/// Everything one transfer created or changed. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferResult {
    pub transfer: Transfer,
    /// Source account after the debit
    pub from_account: Account,
    /// Destination account after the credit
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Whether a transfer may leave the source account below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    #[default]
    Allow,
    Reject,
}
