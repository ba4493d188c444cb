//! Shared test helpers: seeded random data and account setup.

#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use simple_bank::config::TransferConfig;
use simple_bank::currency::SUPPORTED;
use simple_bank::ledger::{Account, CreateAccountParams, MemoryStore, Queries, Store};
use simple_bank::transfer::{TransferEngine, TxCoordinator};

/// Deterministic random data source
pub struct RandomData {
    rng: StdRng,
}

impl RandomData {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn int(&mut self, min: i64, max: i64) -> i64 {
        self.rng.gen_range(min..=max)
    }

    pub fn string(&mut self, len: usize) -> String {
        const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
        (0..len)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    pub fn owner(&mut self) -> String {
        self.string(6)
    }

    pub fn money(&mut self) -> i64 {
        self.int(0, 1000)
    }

    pub fn currency(&mut self) -> &'static str {
        SUPPORTED[self.rng.gen_range(0..SUPPORTED.len())]
    }
}

pub async fn open_account(store: &MemoryStore, owner: &str, balance: i64, currency: &str) -> Account {
    let mut conn = store.acquire().await.unwrap();
    conn.create_account(CreateAccountParams {
        owner: owner.to_string(),
        balance,
        currency: currency.to_string(),
    })
    .await
    .unwrap()
}

pub fn engine(store: &MemoryStore, config: TransferConfig) -> TransferEngine<MemoryStore> {
    TransferEngine::new(TxCoordinator::new(Arc::new(store.clone())), config)
}
