//! Transfer Engine
//!
//! Moves money between two accounts in one transaction:
//! transfer record, debit entry, credit entry, then both balance deltas.
//!
//! # Lock ordering
//!
//! Balance updates take row locks. They are always applied to the account
//! with the smaller id first, whatever its role, so two transfers crossing
//! the same pair of accounts in opposite directions request the locks in the
//! same order and can never wait on each other in a cycle.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::coordinator::TxCoordinator;
use super::types::{OverdraftPolicy, TransferParams, TransferResult};
use crate::config::TransferConfig;
use crate::ledger::{AccountId, CreateTransferParams, LedgerError, Queries, Store};

/// One side of a transfer's balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BalanceDelta {
    pub account_id: AccountId,
    pub delta: i64,
}

impl BalanceDelta {
    fn is_debit(&self) -> bool {
        self.delta < 0
    }
}

/// Both balance deltas of a transfer, in lock-acquisition order.
///
/// Ascending account id; on a tie (self-transfer) the credit goes first.
pub(crate) fn lock_order(params: &TransferParams) -> [BalanceDelta; 2] {
    let debit = BalanceDelta {
        account_id: params.from_account_id,
        delta: -params.amount,
    };
    let credit = BalanceDelta {
        account_id: params.to_account_id,
        delta: params.amount,
    };
    if debit.account_id < credit.account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

/// Transfer engine over a [`Store`]
pub struct TransferEngine<S> {
    coordinator: TxCoordinator<S>,
    config: TransferConfig,
}

impl<S> Clone for TransferEngine<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> TransferEngine<S> {
    pub fn new(coordinator: TxCoordinator<S>, config: TransferConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Execute one transfer atomically.
    ///
    /// Store errors are returned unchanged after the transaction is rolled
    /// back. Not idempotent: identical calls create independent transfers.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        params.validate()?;

        let overdraft = self.config.overdraft;
        let deadline = match self.config.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let outcome = self
            .coordinator
            .run_in_transaction_with_deadline(deadline, move |tx| {
                Box::pin(async move { execute_transfer(tx, params, overdraft).await })
            })
            .await;

        match &outcome {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                "Transfer committed"
            ),
            Err(e) => warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                code = e.code(),
                error = %e,
                "Transfer failed"
            ),
        }
        outcome
    }
}

/// The transfer unit of work. Runs inside the caller's transaction.
pub(crate) async fn execute_transfer<Q: Queries>(
    q: &mut Q,
    params: TransferParams,
    overdraft: OverdraftPolicy,
) -> Result<TransferResult, LedgerError> {
    let from = params.from_account_id;
    let to = params.to_account_id;

    // Re-check existence and currency inside the transaction boundary
    let from_before = q.get_account(from).await?;
    let to_before = q.get_account(to).await?;
    if from_before.currency != to_before.currency {
        return Err(LedgerError::CurrencyMismatch {
            account_id: to,
            expected: from_before.currency,
            actual: to_before.currency,
        });
    }

    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: from,
            to_account_id: to,
            amount: params.amount,
        })
        .await?;

    debug!(transfer_id = transfer.id, "create entry 1");
    let from_entry = q.create_entry(from, -params.amount).await?;

    debug!(transfer_id = transfer.id, "create entry 2");
    let to_entry = q.create_entry(to, params.amount).await?;

    let [first, second] = lock_order(&params);
    debug!(
        transfer_id = transfer.id,
        first = first.account_id,
        second = second.account_id,
        "update balances"
    );
    let first_account = q.add_account_balance(first.account_id, first.delta).await?;
    let second_account = q
        .add_account_balance(second.account_id, second.delta)
        .await?;

    let (from_account, to_account) = if from == to {
        (second_account.clone(), second_account)
    } else if first.is_debit() {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    if overdraft == OverdraftPolicy::Reject && from != to && from_account.balance < 0 {
        return Err(LedgerError::InsufficientFunds {
            account_id: from,
            balance: from_account.balance,
        });
    }

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
