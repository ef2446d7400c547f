pub mod assignment;
pub mod handlers;
pub mod progress;
pub mod settlement;
pub mod tracker;
pub mod types;

use std::sync::Arc;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::app_state::AppState;

pub fn tasks_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handlers::list_tasks_handler))
        .routes(routes!(handlers::claim_reward_handler))
        .with_state(state)
}

/// Catalog and assignment routes; every handler checks the admin token.
pub fn admin_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::create_task_category_handler,
            handlers::list_task_categories_handler
        ))
        .routes(routes!(handlers::assign_task_handler))
        .routes(routes!(handlers::assign_task_by_category_handler))
        .with_state(state)
}
