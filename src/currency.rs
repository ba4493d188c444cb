//! Supported account currencies

pub const USD: &str = "USD";
pub const THB: &str = "THB";

pub const SUPPORTED: [&str; 2] = [USD, THB];

pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED.contains(&currency)
}

/// `validator` hook for request fields
pub fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("currency"))
    }
}
