pub mod handlers;
pub mod service;
pub mod types;

use std::sync::Arc;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::app_state::AppState;

pub fn accounts_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handlers::create_account_handler))
        .routes(routes!(handlers::get_account_handler))
        .with_state(state)
}
