pub mod handlers;
pub mod service;
pub mod types;

use std::sync::Arc;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::app_state::AppState;

pub fn movies_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handlers::create_movie_handler))
        .routes(routes!(handlers::create_review_handler))
        .with_state(state)
}
