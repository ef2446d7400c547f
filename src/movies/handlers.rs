use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::service::{create_movie, create_review};
use super::types::{CreateMovieRequest, CreateReviewRequest, MovieCreatedResponse, ReviewCreatedResponse};
use crate::app_state::AppState;
use crate::auth::check_account_auth;
use crate::error::AppResult;
use crate::types::AccountId;

#[utoipa::path(
    post,
    path = "/{account_id}",
    tag = "movies",
    params(("account_id" = i64, Path, description = "Uploading account")),
    request_body = CreateMovieRequest,
    responses(
        (status = 201, description = "Movie recorded, task progress updated", body = MovieCreatedResponse),
        (status = 400, description = "Invalid movie"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Title already exists"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn create_movie_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
    Json(request): Json<CreateMovieRequest>,
) -> AppResult<(StatusCode, Json<MovieCreatedResponse>)> {
    check_account_auth(&state.config, &headers, account_id)?;

    let mut uow = state.store.begin().await;
    let created = create_movie(&mut uow, account_id, request)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/{account_id}/reviews",
    tag = "movies",
    params(("account_id" = i64, Path, description = "Reviewing account")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review recorded, task progress updated", body = ReviewCreatedResponse),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Account or movie not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
    Json(request): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ReviewCreatedResponse>)> {
    check_account_auth(&state.config, &headers, account_id)?;

    let mut uow = state.store.begin().await;
    let created = create_review(&mut uow, account_id, request)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(created)))
}
