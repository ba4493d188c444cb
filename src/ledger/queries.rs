//! Ledger Store capability
//!
//! [`Queries`] is the one interface for reading and writing ledger rows. It is
//! implemented both by pooled (autocommit) connections and by open
//! transactions, so callers never need to know which one they hold.

use async_trait::async_trait;

use super::error::LedgerError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateTransferParams, Entry, ListParams, Transfer,
};

/// Parameterized reads and writes against accounts, entries and transfers
#[async_trait]
pub trait Queries: Send {
    async fn create_account(&mut self, params: CreateAccountParams)
    -> Result<Account, LedgerError>;

    /// Fails with [`LedgerError::NotFound`] when the account does not exist.
    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>, LedgerError>;

    /// Atomic read-modify-write of one account row.
    ///
    /// Takes the row lock for the rest of the enclosing transaction.
    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, LedgerError>;

    async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, LedgerError>;

    async fn list_entries(&mut self, account_id: AccountId) -> Result<Vec<Entry>, LedgerError>;

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError>;

    /// Transfers from `from` to `to`, oldest first.
    async fn list_transfers(
        &mut self,
        from: AccountId,
        to: AccountId,
    ) -> Result<Vec<Transfer>, LedgerError>;
}

/// An open transaction
///
/// Dropping a transaction without calling `commit` or `rollback` rolls it back.
#[async_trait]
pub trait Transaction: Queries {
    async fn commit(self) -> Result<(), LedgerError>;

    async fn rollback(self) -> Result<(), LedgerError>;
}

/// Connection source for a ledger backend
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Conn: Queries;
    type Tx: Transaction;

    /// Acquire a pooled connection; every statement commits on its own.
    async fn acquire(&self) -> Result<Self::Conn, LedgerError>;

    /// Acquire a connection and open a transaction on it.
    async fn begin(&self) -> Result<Self::Tx, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}
