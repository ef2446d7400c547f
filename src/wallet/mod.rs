pub mod address;
pub mod handlers;
pub mod ledger;
pub mod types;

use std::sync::Arc;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::app_state::AppState;

pub fn wallet_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handlers::ipn_callback_handler))
        .routes(routes!(handlers::get_wallet_handler))
        .routes(routes!(handlers::top_up_handler))
        .routes(routes!(handlers::withdraw_handler))
        .routes(routes!(handlers::update_addresses_handler))
        .routes(routes!(handlers::payment_status_handler))
        .with_state(state)
}

pub fn wallet_admin_router(state: Arc<AppState>) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handlers::add_balance_handler))
        .with_state(state)
}
