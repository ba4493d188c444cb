//! Bank service
//!
//! The operations the HTTP layer needs, behind an object-safe trait so the
//! gateway holds `Arc<dyn BankService>` regardless of the store backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TransferConfig;
use crate::currency::is_supported_currency;
use crate::ledger::{
    Account, AccountId, CreateAccountParams, LedgerError, ListParams, Queries, Store, Transfer,
};
use crate::transfer::{TransferEngine, TransferParams, TransferResult, TxCoordinator};

#[async_trait]
pub trait BankService: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Open an account with a zero balance.
    async fn create_account(&self, owner: &str, currency: &str) -> Result<Account, LedgerError>;

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    async fn list_accounts(&self, params: ListParams) -> Result<Vec<Account>, LedgerError>;

    async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError>;

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

/// [`BankService`] over any [`Store`]
pub struct Bank<S> {
    name: &'static str,
    coordinator: TxCoordinator<S>,
    engine: TransferEngine<S>,
}

impl<S: Store> Bank<S> {
    pub fn new(name: &'static str, store: Arc<S>, config: TransferConfig) -> Self {
        let coordinator = TxCoordinator::new(store);
        let engine = TransferEngine::new(coordinator.clone(), config);
        Self {
            name,
            coordinator,
            engine,
        }
    }
}

#[async_trait]
impl<S: Store> BankService for Bank<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create_account(&self, owner: &str, currency: &str) -> Result<Account, LedgerError> {
        if owner.trim().is_empty() {
            return Err(LedgerError::Validation("owner must not be empty".to_string()));
        }
        if !is_supported_currency(currency) {
            return Err(LedgerError::Validation(format!(
                "unsupported currency: {}",
                currency
            )));
        }

        let params = CreateAccountParams {
            owner: owner.to_string(),
            balance: 0,
            currency: currency.to_string(),
        };
        let account = self
            .coordinator
            .with_connection(move |conn| Box::pin(async move { conn.create_account(params).await }))
            .await?;

        tracing::info!(
            account_id = account.id,
            currency = %account.currency,
            "Account created"
        );
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.coordinator
            .with_connection(move |conn| Box::pin(async move { conn.get_account(id).await }))
            .await
    }

    async fn list_accounts(&self, params: ListParams) -> Result<Vec<Account>, LedgerError> {
        self.coordinator
            .with_connection(move |conn| Box::pin(async move { conn.list_accounts(params).await }))
            .await
    }

    async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        self.engine.transfer(params).await
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, LedgerError> {
        self.coordinator
            .with_connection(move |conn| Box::pin(async move { conn.get_transfer(id).await }))
            .await
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        self.coordinator.store().health_check().await
    }
}
