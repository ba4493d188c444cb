//! In-process ledger store
//!
//! Behaves like the PostgreSQL backend where it matters for transfers:
//! - a bounded connection pool with an acquire timeout
//! - per-account row locks taken by `add_account_balance` and held until the
//!   transaction ends
//! - writes are staged per transaction and only become visible on commit
//! - id sequences are not transactional (rolled-back ids are burned)
//!
//! It can also record every row-lock acquisition (opt-in, see
//! [`MemoryConfig::record_lock_events`]) and supports fault injection, which
//! the transfer tests use to check lock ordering and rollback.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use super::error::LedgerError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateTransferParams, Entry, ListParams, Transfer,
};
use super::queries::{Queries, Store, Transaction};

/// Pool settings for [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Record every row-lock acquisition for [`MemoryStore::take_lock_events`]
    pub record_lock_events: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            record_lock_events: false,
        }
    }
}

/// One row-lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEvent {
    pub tx_id: u64,
    pub account_id: AccountId,
}

/// Committed row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounts {
    pub accounts: usize,
    pub entries: usize,
    pub transfers: usize,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    last_account_id: i64,
    last_entry_id: i64,
    last_transfer_id: i64,
}

#[derive(Default)]
struct Faults {
    balance_update: HashSet<AccountId>,
    commit: bool,
    commit_ack_delay: Option<Duration>,
    rollback: bool,
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>,
    connections: Arc<Semaphore>,
    acquire_timeout: Duration,
    next_session_id: AtomicU64,
    lock_log: Option<Mutex<Vec<LockEvent>>>,
    faults: Mutex<Faults>,
}

/// In-process [`Store`]
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                connections: Arc::new(Semaphore::new(config.max_connections as usize)),
                acquire_timeout: config.acquire_timeout,
                next_session_id: AtomicU64::new(1),
                lock_log: config.record_lock_events.then(|| Mutex::new(Vec::new())),
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    /// Close the pool; later `acquire`/`begin` calls fail with a connection error.
    pub fn close(&self) {
        self.shared.connections.close();
    }

    /// Committed account row, bypassing the pool
    pub fn committed_account(&self, id: AccountId) -> Option<Account> {
        self.shared.tables.lock().accounts.get(&id).cloned()
    }

    pub fn counts(&self) -> LedgerCounts {
        let tables = self.shared.tables.lock();
        LedgerCounts {
            accounts: tables.accounts.len(),
            entries: tables.entries.len(),
            transfers: tables.transfers.len(),
        }
    }

    /// Drain the row-lock acquisition log. Always empty unless
    /// [`MemoryConfig::record_lock_events`] is set.
    pub fn take_lock_events(&self) -> Vec<LockEvent> {
        match &self.shared.lock_log {
            Some(log) => std::mem::take(&mut *log.lock()),
            None => Vec::new(),
        }
    }

    // === Failpoints ===

    /// Make every balance update of `id` fail with a store error.
    pub fn fail_balance_update(&self, id: AccountId) {
        self.shared.faults.lock().balance_update.insert(id);
    }

    /// Make the next commit fail. The transaction is discarded.
    pub fn fail_next_commit(&self) {
        self.shared.faults.lock().commit = true;
    }

    /// Apply the next commit, then wait `delay` before acknowledging it.
    pub fn delay_next_commit_ack(&self, delay: Duration) {
        self.shared.faults.lock().commit_ack_delay = Some(delay);
    }

    /// Make the next rollback report a failure. The transaction is still discarded.
    pub fn fail_next_rollback(&self) {
        self.shared.faults.lock().rollback = true;
    }

    pub fn clear_faults(&self) {
        *self.shared.faults.lock() = Faults::default();
    }

    async fn open_session(&self, autocommit: bool) -> Result<MemorySession, LedgerError> {
        let acquire = self.shared.connections.clone().acquire_owned();
        let permit = tokio::time::timeout(self.shared.acquire_timeout, acquire)
            .await
            .map_err(|_| {
                LedgerError::Connection(
                    "pool timed out while waiting for an open connection".to_string(),
                )
            })?
            .map_err(|_| {
                LedgerError::Connection(
                    "attempted to acquire a connection on a closed pool".to_string(),
                )
            })?;

        Ok(MemorySession {
            shared: self.shared.clone(),
            id: self.shared.next_session_id.fetch_add(1, Ordering::Relaxed),
            autocommit,
            held: HashMap::new(),
            pending: Pending::default(),
            finished: false,
            _permit: permit,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Conn = MemorySession;
    type Tx = MemorySession;

    async fn acquire(&self) -> Result<MemorySession, LedgerError> {
        self.open_session(true).await
    }

    async fn begin(&self) -> Result<MemorySession, LedgerError> {
        self.open_session(false).await
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        if self.shared.connections.is_closed() {
            return Err(LedgerError::Connection("pool closed".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Pending {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.entries.is_empty() && self.transfers.is_empty()
    }
}

/// A connection checked out of a [`MemoryStore`]
///
/// In autocommit mode every write is applied immediately and row locks are
/// released after each statement; otherwise it is an open transaction.
pub struct MemorySession {
    shared: Arc<Shared>,
    id: u64,
    autocommit: bool,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    pending: Pending,
    finished: bool,
    _permit: OwnedSemaphorePermit,
}

impl MemorySession {
    /// Session id as recorded in [`LockEvent::tx_id`]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn visible_account(&self, id: AccountId) -> Option<Account> {
        if let Some(account) = self.pending.accounts.get(&id) {
            return Some(account.clone());
        }
        self.shared.tables.lock().accounts.get(&id).cloned()
    }

    fn foreign_key_violation(table: &str, id: AccountId) -> LedgerError {
        LedgerError::Store(format!(
            "insert on table \"{}\" violates foreign key constraint: account {} does not exist",
            table, id
        ))
    }

    async fn lock_row(&mut self, id: AccountId) {
        if self.held.contains_key(&id) {
            return;
        }
        let row = {
            let mut locks = self.shared.row_locks.lock();
            locks.entry(id).or_default().clone()
        };
        let guard = row.lock_owned().await;
        if let Some(log) = &self.shared.lock_log {
            log.lock().push(LockEvent {
                tx_id: self.id,
                account_id: id,
            });
        }
        self.held.insert(id, guard);
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mut tables = self.shared.tables.lock();
        // Row locks are held for every staged existing account, so overwriting is safe
        tables.accounts.extend(pending.accounts);
        tables.entries.extend(pending.entries);
        tables.transfers.extend(pending.transfers);
    }

    fn end_statement(&mut self) {
        if self.autocommit {
            self.apply_pending();
            self.held.clear();
        }
    }

    fn discard(&mut self) {
        self.pending = Pending::default();
        self.held.clear();
        self.finished = true;
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if !self.finished && !self.autocommit && (!self.pending.is_empty() || !self.held.is_empty())
        {
            tracing::warn!(
                tx_id = self.id,
                "Transaction dropped without commit, rolling back"
            );
        }
    }
}

#[async_trait]
impl Queries for MemorySession {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        let id = {
            let mut tables = self.shared.tables.lock();
            tables.last_account_id += 1;
            tables.last_account_id
        };
        let account = Account {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.pending.accounts.insert(id, account.clone());
        self.end_statement();
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.visible_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>, LedgerError> {
        let mut merged = self.shared.tables.lock().accounts.clone();
        merged.extend(
            self.pending
                .accounts
                .iter()
                .map(|(id, account)| (*id, account.clone())),
        );
        Ok(merged
            .into_values()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        if self.visible_account(id).is_none() {
            return Err(LedgerError::account_not_found(id));
        }
        self.lock_row(id).await;

        if self.shared.faults.lock().balance_update.contains(&id) {
            return Err(LedgerError::Store(format!(
                "injected failure updating balance of account {}",
                id
            )));
        }

        // Re-read under the lock: another transaction may have committed meanwhile
        let mut account = self
            .visible_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Store("bigint out of range".to_string()))?;

        self.pending.accounts.insert(id, account.clone());
        self.end_statement();
        Ok(account)
    }

    async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, LedgerError> {
        if self.visible_account(account_id).is_none() {
            return Err(Self::foreign_key_violation("entries", account_id));
        }
        let id = {
            let mut tables = self.shared.tables.lock();
            tables.last_entry_id += 1;
            tables.last_entry_id
        };
        let entry = Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.pending.entries.push(entry.clone());
        self.end_statement();
        Ok(entry)
    }

    async fn list_entries(&mut self, account_id: AccountId) -> Result<Vec<Entry>, LedgerError> {
        let committed: Vec<Entry> = self
            .shared
            .tables
            .lock()
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        Ok(committed
            .into_iter()
            .chain(
                self.pending
                    .entries
                    .iter()
                    .filter(|e| e.account_id == account_id)
                    .cloned(),
            )
            .collect())
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        for id in [params.from_account_id, params.to_account_id] {
            if self.visible_account(id).is_none() {
                return Err(Self::foreign_key_violation("transfers", id));
            }
        }
        if params.amount <= 0 {
            return Err(LedgerError::Store(
                "new row for relation \"transfers\" violates check constraint \"transfers_amount_check\""
                    .to_string(),
            ));
        }
        let id = {
            let mut tables = self.shared.tables.lock();
            tables.last_transfer_id += 1;
            tables.last_transfer_id
        };
        let transfer = Transfer {
            id,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.pending.transfers.push(transfer.clone());
        self.end_statement();
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, LedgerError> {
        if let Some(transfer) = self.pending.transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }
        self.shared
            .tables
            .lock()
            .transfers
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {}", id)))
    }

    async fn list_transfers(
        &mut self,
        from: AccountId,
        to: AccountId,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let matches = |t: &&Transfer| t.from_account_id == from && t.to_account_id == to;
        let committed: Vec<Transfer> = self
            .shared
            .tables
            .lock()
            .transfers
            .iter()
            .filter(matches)
            .cloned()
            .collect();
        Ok(committed
            .into_iter()
            .chain(self.pending.transfers.iter().filter(matches).cloned())
            .collect())
    }
}

#[async_trait]
impl Transaction for MemorySession {
    async fn commit(mut self) -> Result<(), LedgerError> {
        let injected = std::mem::take(&mut self.shared.faults.lock().commit);
        if injected {
            self.discard();
            return Err(LedgerError::Commit(
                "injected commit failure".to_string(),
            ));
        }
        let ack_delay = self.shared.faults.lock().commit_ack_delay.take();
        self.apply_pending();
        self.held.clear();
        self.finished = true;
        if let Some(delay) = ack_delay {
            tokio::time::sleep(delay).await;
        }
        tracing::trace!(tx_id = self.id, "Transaction committed");
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), LedgerError> {
        let injected = std::mem::take(&mut self.shared.faults.lock().rollback);
        self.discard();
        if injected {
            return Err(LedgerError::Connection(
                "injected rollback failure: connection reset".to_string(),
            ));
        }
        tracing::trace!(tx_id = self.id, "Transaction rolled back");
        Ok(())
    }
}
