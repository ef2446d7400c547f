use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::ledger::{
    add_balance, apply_callback, check_payment_status, read_wallet, top_up, update_addresses,
    withdraw,
};
use super::types::{
    AddBalanceRequest, TopUpRequest, Transaction, UpdateAddressesRequest, Wallet, WalletResponse,
    WithdrawRequest,
};
use crate::app_state::AppState;
use crate::auth::{check_account_auth, check_admin_auth};
use crate::consts::NOWPAYMENTS_SIGNATURE_HEADER;
use crate::error::AppResult;
use crate::payments::{parse_verified_callback, PaymentDetails};
use crate::types::AccountId;

#[utoipa::path(
    get,
    path = "/{account_id}",
    tag = "wallet",
    params(("account_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Wallet with its transactions", body = WalletResponse),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn get_wallet_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
) -> AppResult<Json<WalletResponse>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let uow = state.store.begin().await;
    Ok(Json(read_wallet(&uow, account_id)?))
}

#[utoipa::path(
    post,
    path = "/{account_id}/top-up",
    tag = "wallet",
    params(("account_id" = i64, Path, description = "Account id")),
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Payment created, pay to the returned address", body = PaymentDetails),
        (status = 400, description = "Invalid amount or unsupported currency"),
        (status = 404, description = "Account not found"),
        (status = 502, description = "Payment provider error"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip(state, headers))]
pub async fn top_up_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
    Json(request): Json<TopUpRequest>,
) -> AppResult<Json<PaymentDetails>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let payment = top_up(&state.store, &state.payments, account_id, request).await?;
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/{account_id}/withdraw",
    tag = "wallet",
    params(("account_id" = i64, Path, description = "Account id")),
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Balance debited, withdrawal pending", body = WalletResponse),
        (status = 400, description = "Invalid amount or insufficient balance"),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip(state, headers))]
pub async fn withdraw_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
    Json(request): Json<WithdrawRequest>,
) -> AppResult<Json<WalletResponse>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let mut uow = state.store.begin().await;
    let wallet = withdraw(&mut uow, account_id, request)?;
    uow.commit().await?;
    Ok(Json(wallet))
}

#[utoipa::path(
    post,
    path = "/{account_id}/addresses",
    tag = "wallet",
    params(("account_id" = i64, Path, description = "Account id")),
    request_body = UpdateAddressesRequest,
    responses(
        (status = 200, description = "Payout addresses updated", body = Wallet),
        (status = 400, description = "An address has the wrong format"),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn update_addresses_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
    Json(request): Json<UpdateAddressesRequest>,
) -> AppResult<Json<Wallet>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let mut uow = state.store.begin().await;
    let wallet = update_addresses(&mut uow, account_id, request)?;
    uow.commit().await?;
    Ok(Json(wallet))
}

#[utoipa::path(
    get,
    path = "/{account_id}/payments/{payment_id}",
    tag = "wallet",
    params(
        ("account_id" = i64, Path, description = "Account id"),
        ("payment_id" = String, Path, description = "Provider payment id")
    ),
    responses(
        (status = 200, description = "Transaction for the payment", body = Transaction),
        (status = 404, description = "No such payment on this account"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn payment_status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((account_id, payment_id)): Path<(AccountId, String)>,
) -> AppResult<Json<Transaction>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let uow = state.store.begin().await;
    Ok(Json(check_payment_status(&uow, account_id, &payment_id)?))
}

/// The signature covers the canonical form of the body, so the handler takes
/// the raw bytes rather than a typed `Json` extractor.
#[utoipa::path(
    post,
    path = "/ipn_callback",
    tag = "wallet",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Notification applied"),
        (status = 401, description = "Missing or invalid x-nowpayments-sig"),
        (status = 404, description = "Unknown payment id")
    )
)]
#[instrument(skip_all)]
pub async fn ipn_callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(NOWPAYMENTS_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let payload = parse_verified_callback(&state.config.nowpayments.ipn_secret, signature, &body)
        .inspect_err(|e| log::warn!("Rejected IPN callback: {e}"))?;

    let mut uow = state.store.begin().await;
    let outcome = apply_callback(&mut uow, &payload)?;
    uow.commit().await?;
    log::info!(
        "IPN for payment {} (order {}, paid in {}) applied: {:?}",
        payload.payment_id,
        payload.order_id.as_deref().unwrap_or("-"),
        payload.pay_currency.as_deref().unwrap_or("-"),
        outcome
    );

    Ok(Json(json!({ "message": "success" })))
}

#[utoipa::path(
    post,
    path = "/wallet/add-balance",
    tag = "admin",
    request_body = AddBalanceRequest,
    responses(
        (status = 200, description = "Wallet credited", body = Wallet),
        (status = 400, description = "Amount must be positive"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer" = []))
)]
#[instrument(skip(state, headers))]
pub async fn add_balance_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AddBalanceRequest>,
) -> AppResult<Json<Wallet>> {
    check_admin_auth(&state.config.admin_token, &headers)?;

    let mut uow = state.store.begin().await;
    let wallet = add_balance(&mut uow, request)?;
    uow.commit().await?;
    Ok(Json(wallet))
}
