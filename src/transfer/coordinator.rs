//! Transaction Coordinator
//!
//! Runs a unit of work inside exactly one store transaction and guarantees
//! exactly one of {commit, rollback} on every exit path:
//! - `Ok`: commit (failure surfaces as [`LedgerError::Commit`], never retried)
//! - `Err`: rollback (a failing rollback is combined with the original error)
//! - deadline passed before the unit of work finished: rollback, `Timeout`
//! - panic: rollback, then the panic resumes
//! - caller dropped the future: the transaction handle rolls back on drop
//!
//! The deadline never covers `commit`: once the unit of work has finished the
//! outcome is decided by the store alone.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{error, warn};

use crate::ledger::{LedgerError, Store, Transaction};

/// Transaction coordinator over a [`Store`]
pub struct TxCoordinator<S> {
    store: Arc<S>,
}

impl<S> Clone for TxCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> TxCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run queries on a pooled connection, outside any transaction.
    pub async fn with_connection<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut S::Conn) -> BoxFuture<'c, Result<T, LedgerError>> + Send,
    {
        let mut conn = self.store.acquire().await?;
        work(&mut conn).await
    }

    /// Run `unit_of_work` inside a new transaction.
    ///
    /// The unit of work only ever sees the transaction, so it cannot open a
    /// nested one through this coordinator.
    pub async fn run_in_transaction<T, F>(&self, unit_of_work: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, LedgerError>> + Send,
    {
        self.run_in_transaction_with_deadline(None, unit_of_work).await
    }

    /// Like [`run_in_transaction`](Self::run_in_transaction), but the unit of
    /// work must finish within `deadline`, otherwise the transaction is rolled
    /// back and [`LedgerError::Timeout`] returned.
    pub async fn run_in_transaction_with_deadline<T, F>(
        &self,
        deadline: Option<Duration>,
        unit_of_work: F,
    ) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, LedgerError>> + Send,
    {
        let mut tx = self.store.begin().await?;

        let work = AssertUnwindSafe(unit_of_work(&mut tx)).catch_unwind();
        let outcome = match deadline {
            None => work.await,
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(timeout_ms = ms, "Unit of work timed out, rolling back");
                    Ok(Err(LedgerError::Timeout(ms)))
                }
            },
        };

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await.map_err(|e| match e {
                    LedgerError::Commit(_) => e,
                    other => LedgerError::Commit(other.to_string()),
                })?;
                Ok(value)
            }
            Ok(Err(err)) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => {
                    error!(error = %err, rollback_error = %rollback, "Rollback failed");
                    Err(LedgerError::Combined {
                        cause: Box::new(err),
                        rollback: Box::new(rollback),
                    })
                }
            },
            Err(panic) => {
                warn!("Unit of work panicked, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(rollback_error = %rollback, "Rollback after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateAccountParams, MemoryConfig, MemoryStore, Queries};

    async fn setup() -> (Arc<MemoryStore>, TxCoordinator<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .acquire()
            .await
            .unwrap()
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                balance: 100,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();
        let coordinator = TxCoordinator::new(store.clone());
        (store, coordinator)
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let (store, coordinator) = setup().await;

        let balance = coordinator
            .run_in_transaction(|tx| {
                Box::pin(async move {
                    tx.create_entry(1, 25).await?;
                    Ok(tx.add_account_balance(1, 25).await?.balance)
                })
            })
            .await
            .unwrap();

        assert_eq!(balance, 125);
        assert_eq!(store.committed_account(1).unwrap().balance, 125);
        assert_eq!(store.counts().entries, 1);
    }

    #[tokio::test]
    async fn test_rollback_returns_original_error() {
        let (store, coordinator) = setup().await;

        let err = coordinator
            .run_in_transaction(|tx| {
                Box::pin(async move {
                    tx.add_account_balance(1, 25).await?;
                    tx.get_account(99).await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::account_not_found(99));
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_combined() {
        let (store, coordinator) = setup().await;
        store.fail_next_rollback();

        let err = coordinator
            .run_in_transaction(|tx| {
                Box::pin(async move {
                    tx.add_account_balance(1, 25).await?;
                    Err::<(), _>(LedgerError::Store("insert failed".into()))
                })
            })
            .await
            .unwrap_err();

        match err {
            LedgerError::Combined { cause, rollback } => {
                assert_eq!(*cause, LedgerError::Store("insert failed".into()));
                assert!(matches!(*rollback, LedgerError::Connection(_)));
            }
            other => panic!("expected combined error, got {:?}", other),
        }
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_commit_failure_surfaces_as_commit_error() {
        let (store, coordinator) = setup().await;
        store.fail_next_commit();

        let err = coordinator
            .run_in_transaction(|tx| {
                Box::pin(async move {
                    tx.add_account_balance(1, 25).await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Commit(_)));
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_begin_failure_is_connection_error() {
        let store = Arc::new(MemoryStore::with_config(MemoryConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(20),
            ..MemoryConfig::default()
        }));
        let coordinator = TxCoordinator::new(store.clone());
        let _busy = store.begin().await.unwrap();

        let err = coordinator
            .run_in_transaction(|_tx| Box::pin(async move { Ok(()) }))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Connection(_)));
    }

    #[tokio::test]
    async fn test_panic_rolls_back_and_resumes() {
        let (store, coordinator) = setup().await;

        let task = tokio::spawn(async move {
            coordinator
                .run_in_transaction(|tx| {
                    Box::pin(async move {
                        tx.add_account_balance(1, 25).await?;
                        if tx.get_account(1).await?.balance > 0 {
                            panic!("boom");
                        }
                        Ok(())
                    })
                })
                .await
        });

        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
        // Row lock released by the rollback
        let mut conn = store.acquire().await.unwrap();
        assert_eq!(conn.add_account_balance(1, 1).await.unwrap().balance, 101);
    }

    #[tokio::test]
    async fn test_cancelled_unit_of_work_rolls_back() {
        let (store, coordinator) = setup().await;

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.run_in_transaction(|tx| {
                Box::pin(async move {
                    tx.add_account_balance(1, 25).await?;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
            }),
        )
        .await;

        assert!(result.is_err(), "unit of work should have been cancelled");
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_deadline_rolls_back_stalled_work() {
        let (store, coordinator) = setup().await;

        let err = coordinator
            .run_in_transaction_with_deadline(Some(Duration::from_millis(20)), |tx| {
                Box::pin(async move {
                    tx.add_account_balance(1, 25).await?;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::Timeout(20));
        assert_eq!(store.committed_account(1).unwrap().balance, 100);
        // Row lock released by the rollback
        let mut conn = store.acquire().await.unwrap();
        assert_eq!(conn.add_account_balance(1, 1).await.unwrap().balance, 101);
    }

    #[tokio::test]
    async fn test_deadline_does_not_cover_commit() {
        let (store, coordinator) = setup().await;
        store.delay_next_commit_ack(Duration::from_millis(100));

        let balance = coordinator
            .run_in_transaction_with_deadline(Some(Duration::from_millis(20)), |tx| {
                Box::pin(async move { Ok(tx.add_account_balance(1, 25).await?.balance) })
            })
            .await
            .unwrap();

        assert_eq!(balance, 125);
        assert_eq!(store.committed_account(1).unwrap().balance, 125);
    }

    #[tokio::test]
    async fn test_with_connection_autocommits() {
        let (store, coordinator) = setup().await;

        coordinator
            .with_connection(|conn| {
                Box::pin(async move {
                    conn.add_account_balance(1, -40).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert_eq!(store.committed_account(1).unwrap().balance, 60);
    }
}
