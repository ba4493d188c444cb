//! Gateway HTTP handlers
//!
//! - [`account`]: create / get / list accounts
//! - [`transfer`]: create / get transfers
//! - [`health`]: liveness + store ping

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{create_account, get_account, list_accounts};
pub use health::{HealthResponse, health_check};
pub use transfer::{create_transfer, get_transfer};
