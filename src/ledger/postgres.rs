//! PostgreSQL ledger store
//!
//! [`PgQueries`] runs the ledger statements over anything that dereferences to
//! a `PgConnection`: a pooled connection for autocommit reads, or an open
//! `sqlx::Transaction` for units of work.

use std::ops::DerefMut;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

use super::error::LedgerError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateTransferParams, Entry, ListParams, Transfer,
};
use super::queries::{Queries, Store, Transaction};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// Ledger statements bound to one PostgreSQL connection
pub struct PgQueries<C> {
    conn: C,
}

pub type PgConn = PgQueries<PoolConnection<Postgres>>;
pub type PgTx = PgQueries<sqlx::Transaction<'static, Postgres>>;

impl<C> PgQueries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> Queries for PgQueries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>, LedgerError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts ORDER BY id LIMIT $1 OFFSET $2",
            ACCOUNT_COLUMNS
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(accounts)
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        // UPDATE takes the row lock; it is held until the transaction ends
        sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, LedgerError> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(entry)
    }

    async fn list_entries(&mut self, account_id: AccountId) -> Result<Vec<Entry>, LedgerError> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {} FROM entries WHERE account_id = $1 ORDER BY id",
            ENTRY_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(entries)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        let transfer = sqlx::query_as::<_, Transfer>(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) \
             VALUES ($1, $2, $3) RETURNING {}",
            TRANSFER_COLUMNS
        ))
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError> {
        sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {} FROM transfers WHERE id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("transfer {}", id)))
    }

    async fn list_transfers(
        &mut self,
        from: AccountId,
        to: AccountId,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let transfers = sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {} FROM transfers WHERE from_account_id = $1 AND to_account_id = $2 ORDER BY id",
            TRANSFER_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(transfers)
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn commit(self) -> Result<(), LedgerError> {
        self.conn
            .commit()
            .await
            .map_err(|e| LedgerError::Commit(e.to_string()))
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.conn.rollback().await?;
        Ok(())
    }
}

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Conn = PgConn;
    type Tx = PgTx;

    async fn acquire(&self) -> Result<PgConn, LedgerError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        Ok(PgQueries::new(conn))
    }

    async fn begin(&self) -> Result<PgTx, LedgerError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        Ok(PgQueries::new(tx))
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
