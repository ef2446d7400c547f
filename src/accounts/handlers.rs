use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::service::{create_account, read_account};
use super::types::{AccountResponse, CreateAccountRequest};
use crate::app_state::AppState;
use crate::auth::check_account_auth;
use crate::error::AppResult;
use crate::types::AccountId;

#[utoipa::path(
    post,
    path = "/",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created with its wallet and starter tasks", body = AccountResponse),
        (status = 400, description = "Invalid username or email"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn create_account_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let mut uow = state.store.begin().await;
    let account = create_account(&mut uow, request)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    get,
    path = "/{account_id}",
    tag = "accounts",
    params(("account_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account with wallet balance", body = AccountResponse),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn get_account_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
) -> AppResult<Json<AccountResponse>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let uow = state.store.begin().await;
    Ok(Json(read_account(&uow, account_id)?))
}
