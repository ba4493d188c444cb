//! Transfer semantics through the public API.

mod common;

use simple_bank::config::TransferConfig;
use simple_bank::ledger::{LedgerError, MemoryConfig, MemoryStore, Queries, Store};
use simple_bank::transfer::{OverdraftPolicy, TransferParams};

use common::{engine, open_account};

#[tokio::test]
async fn test_identical_calls_create_two_transfers() {
    let store = MemoryStore::new();
    let a1 = open_account(&store, "alice", 1000, "USD").await;
    let a2 = open_account(&store, "bob", 500, "USD").await;
    let engine = engine(&store, TransferConfig::default());

    let params = TransferParams::new(a1.id, a2.id, 200);
    let first = engine.transfer(params).await.unwrap();
    let second = engine.transfer(params).await.unwrap();

    assert_ne!(first.transfer.id, second.transfer.id);
    assert_eq!(second.from_account.balance, 600);
    assert_eq!(second.to_account.balance, 900);

    let mut conn = store.acquire().await.unwrap();
    assert_eq!(conn.list_transfers(a1.id, a2.id).await.unwrap().len(), 2);
    let entries = conn.list_entries(a1.id).await.unwrap();
    assert_eq!(entries.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![-200, -200]);
}

#[tokio::test]
async fn test_failed_transfer_leaves_ledger_untouched() {
    let store = MemoryStore::new();
    let a1 = open_account(&store, "alice", 1000, "USD").await;
    let a2 = open_account(&store, "bob", 500, "USD").await;
    let engine = engine(&store, TransferConfig::default());

    store.fail_balance_update(a2.id);
    let err = engine
        .transfer(TransferParams::new(a1.id, a2.id, 200))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));

    assert_eq!(store.committed_account(a1.id).unwrap().balance, 1000);
    assert_eq!(store.committed_account(a2.id).unwrap().balance, 500);
    let counts = store.counts();
    assert_eq!(counts.transfers, 0);
    assert_eq!(counts.entries, 0);

    store.clear_faults();
    engine
        .transfer(TransferParams::new(a1.id, a2.id, 200))
        .await
        .unwrap();
    assert_eq!(store.committed_account(a1.id).unwrap().balance, 800);
}

#[tokio::test]
async fn test_overdraft_policy() {
    let store = MemoryStore::new();
    let a1 = open_account(&store, "alice", 1000, "USD").await;
    let a2 = open_account(&store, "bob", 500, "USD").await;

    let reject = engine(
        &store,
        TransferConfig {
            overdraft: OverdraftPolicy::Reject,
            ..TransferConfig::default()
        },
    );
    let err = reject
        .transfer(TransferParams::new(a2.id, a1.id, 9999))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(store.counts().transfers, 0);

    let allow = engine(&store, TransferConfig::default());
    let result = allow
        .transfer(TransferParams::new(a2.id, a1.id, 9999))
        .await
        .unwrap();
    assert_eq!(result.from_account.balance, 500 - 9999);
    assert_eq!(result.to_account.balance, 1000 + 9999);
}

#[tokio::test]
async fn test_lock_order_is_by_account_id() {
    let store = MemoryStore::with_config(MemoryConfig {
        record_lock_events: true,
        ..MemoryConfig::default()
    });
    let mut ids = Vec::new();
    for owner in ["a", "b", "c", "d", "e"] {
        ids.push(open_account(&store, owner, 100, "THB").await.id);
    }
    let (low, high) = (ids[2], ids[4]);
    let engine = engine(&store, TransferConfig::default());

    store.take_lock_events();
    engine
        .transfer(TransferParams::new(high, low, 10))
        .await
        .unwrap();
    engine
        .transfer(TransferParams::new(low, high, 10))
        .await
        .unwrap();

    let locked: Vec<i64> = store
        .take_lock_events()
        .iter()
        .map(|e| e.account_id)
        .collect();
    assert_eq!(locked, vec![low, high, low, high]);
}
