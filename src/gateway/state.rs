use std::sync::Arc;

use crate::bank::BankService;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Accounts and transfers, backed by PostgreSQL or the in-process store
    pub bank: Arc<dyn BankService>,
}

impl AppState {
    pub fn new(bank: Arc<dyn BankService>) -> Self {
        Self { bank }
    }
}
