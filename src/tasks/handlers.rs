use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::instrument;

use super::assignment::{
    assign_task, assign_task_by_category_id, create_task_category, list_task_categories,
};
use super::settlement::claim_reward;
use super::tracker::list_tasks;
use super::types::{
    AssignTaskByCategoryRequest, AssignTaskRequest, ClaimResponse, CreateTaskCategoryRequest,
    TaskCategory, TaskResponse,
};
use crate::app_state::AppState;
use crate::auth::{check_account_auth, check_admin_auth};
use crate::error::AppResult;
use crate::types::{AccountId, TaskId};

#[utoipa::path(
    get,
    path = "/{account_id}",
    tag = "tasks",
    params(("account_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Tasks of the account with their progress", body = Vec<TaskResponse>),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(account_id): Path<AccountId>,
) -> AppResult<Json<Vec<TaskResponse>>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let uow = state.store.begin().await;
    Ok(Json(list_tasks(&uow, account_id)?))
}

#[utoipa::path(
    post,
    path = "/{account_id}/claim/{task_id}",
    tag = "tasks",
    params(
        ("account_id" = i64, Path, description = "Account id"),
        ("task_id" = i64, Path, description = "Task to claim")
    ),
    responses(
        (status = 200, description = "Reward credited to the wallet", body = ClaimResponse),
        (status = 404, description = "Task not found for this account"),
        (status = 409, description = "Reward already claimed"),
        (status = 412, description = "Task not completed yet"),
        (status = 401, description = "Missing or invalid account token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip(state, headers))]
pub async fn claim_reward_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((account_id, task_id)): Path<(AccountId, TaskId)>,
) -> AppResult<Json<ClaimResponse>> {
    check_account_auth(&state.config, &headers, account_id)?;

    let mut uow = state.store.begin().await;
    let claimed = claim_reward(&mut uow, account_id, task_id)?;
    uow.commit().await?;
    Ok(Json(claimed))
}

#[utoipa::path(
    post,
    path = "/task-categories",
    tag = "admin",
    request_body = CreateTaskCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = TaskCategory),
        (status = 400, description = "Invalid category"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn create_task_category_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateTaskCategoryRequest>,
) -> AppResult<(StatusCode, Json<TaskCategory>)> {
    check_admin_auth(&state.config.admin_token, &headers)?;

    let mut uow = state.store.begin().await;
    let category = create_task_category(&mut uow, request)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/task-categories",
    tag = "admin",
    responses(
        (status = 200, description = "Task catalog in id order", body = Vec<TaskCategory>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn list_task_categories_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<TaskCategory>>> {
    check_admin_auth(&state.config.admin_token, &headers)?;

    let uow = state.store.begin().await;
    Ok(Json(list_task_categories(&uow)))
}

#[utoipa::path(
    post,
    path = "/tasks/assign",
    tag = "admin",
    request_body = AssignTaskRequest,
    responses(
        (status = 201, description = "Next free task of the level assigned", body = TaskResponse),
        (status = 404, description = "Account not found or no categories at this level"),
        (status = 409, description = "Every category of the level is already held"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn assign_task_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AssignTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskResponse>)> {
    check_admin_auth(&state.config.admin_token, &headers)?;

    let mut uow = state.store.begin().await;
    let task = assign_task(&mut uow, request.account_id, request.task_level)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    post,
    path = "/tasks/assign-category",
    tag = "admin",
    request_body = AssignTaskByCategoryRequest,
    responses(
        (status = 201, description = "Task assigned", body = TaskResponse),
        (status = 404, description = "Account or category not found"),
        (status = 409, description = "Account already holds this category"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn assign_task_by_category_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AssignTaskByCategoryRequest>,
) -> AppResult<(StatusCode, Json<TaskResponse>)> {
    check_admin_auth(&state.config.admin_token, &headers)?;

    let mut uow = state.store.begin().await;
    let task = assign_task_by_category_id(&mut uow, request.account_id, request.task_category_id)?;
    uow.commit().await?;
    Ok((StatusCode::CREATED, Json(task)))
}
