//! Account handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CreateAccountRequest, ListAccountsQuery, ok,
};
use crate::ledger::{Account, ListParams};

/// Create account endpoint
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created with zero balance", body = Account),
        (status = 400, description = "Invalid owner or unsupported currency"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    req.validate()?;
    let account = state.bank.create_account(&req.owner, &req.currency).await?;
    ok(account)
}

/// Get account endpoint
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(
        ("id" = i64, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 400, description = "Invalid account ID"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    if id < 1 {
        return ApiError::bad_request("Account ID must be positive").into_err();
    }
    ok(state.bank.get_account(id).await?)
}

/// List accounts endpoint
///
/// GET /api/v1/accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "One page of accounts ordered by id", body = Vec<Account>),
        (status = 400, description = "Invalid paging parameters")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAccountsQuery>,
) -> ApiResult<Vec<Account>> {
    query.validate()?;
    let offset = (query.page_id - 1)
        .checked_mul(query.page_size)
        .ok_or_else(|| ApiError::bad_request("page_id out of range"))?;
    let params = ListParams {
        limit: query.page_size,
        offset,
    };
    ok(state.bank.list_accounts(params).await?)
}
