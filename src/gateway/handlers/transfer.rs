//! Transfer handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransferRequest, ok};
use crate::ledger::{AccountId, LedgerError, Transfer};
use crate::transfer::{TransferParams, TransferResult};

/// Create transfer endpoint
///
/// POST /api/v1/transfers
///
/// Both accounts must exist and hold the request currency before the
/// transfer engine is invoked.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferResult),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Insufficient funds (overdraft rejected)"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResult> {
    req.validate()?;

    valid_account(&state, req.from_account_id, &req.currency).await?;
    valid_account(&state, req.to_account_id, &req.currency).await?;

    tracing::info!(
        from = req.from_account_id,
        to = req.to_account_id,
        amount = req.amount,
        "Initiating transfer"
    );

    let params = TransferParams::new(req.from_account_id, req.to_account_id, req.amount);
    ok(state.bank.transfer(params).await?)
}

/// The account must exist and be denominated in `currency`.
async fn valid_account(
    state: &AppState,
    account_id: AccountId,
    currency: &str,
) -> Result<(), ApiError> {
    let account = state.bank.get_account(account_id).await?;
    if account.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            account_id,
            expected: currency.to_string(),
            actual: account.currency,
        }
        .into());
    }
    Ok(())
}

/// Get transfer endpoint
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(
        ("id" = i64, Path, description = "Transfer ID")
    ),
    responses(
        (status = 200, description = "Transfer record", body = Transfer),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    if id < 1 {
        return ApiError::bad_request("Transfer ID must be positive").into_err();
    }
    ok(state.bank.get_transfer(id).await?)
}
