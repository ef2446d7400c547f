use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{routing::get, Router};
use crate::config::AppConfig;
use sentry_tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::instrument;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::consts::MAX_REQUEST_BODY_BYTES;

mod accounts;
mod app_state;
mod auth;
mod config;
mod consts;
mod error;
mod middleware;
mod movies;
mod payments;
mod store;
mod tasks;
#[cfg(test)]
mod test_utils;
mod types;
mod wallet;

use app_state::AppState;

#[derive(OpenApi)]
#[openapi(
    modifiers(&AdminBearer),
    tags(
        (name = "accounts", description = "Account creation and lookup"),
        (name = "tasks", description = "Task progress and reward claims"),
        (name = "wallet", description = "Wallet, top-ups, withdrawals and payment notifications"),
        (name = "movies", description = "Movie uploads and reviews"),
        (name = "admin", description = "Task catalog and manual credits"),
    )
)]
struct ApiDoc;

struct AdminBearer;

impl Modify for AdminBearer {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi
            .components
            .get_or_insert_with(Default::default)
            .add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
    }
}

fn app_router(shared_state: Arc<AppState>) -> Router {
    let admin = tasks::admin_router(shared_state.clone())
        .merge(wallet::wallet_admin_router(shared_state.clone()));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest(
            "/api/v1/accounts",
            accounts::accounts_router(shared_state.clone()),
        )
        .nest("/api/v1/tasks", tasks::tasks_router(shared_state.clone()))
        .nest("/api/v1/wallet", wallet::wallet_router(shared_state.clone()))
        .nest("/api/v1/movies", movies::movies_router(shared_state.clone()))
        .nest("/api/v1/admin", admin)
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .route("/healthz", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(
            crate::middleware::http_logging_middleware,
        )) // HTTP logging before Sentry
}

async fn main_impl(conf: AppConfig) -> Result<()> {
    let listen_addr = conf.listen_addr.clone();
    let shared_state = Arc::new(AppState::new(conf).await?);

    let sentry_tower_layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::with_transaction());

    let http = app_router(shared_state).layer(sentry_tower_layer);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;

    log::info!("listening on {listen_addr}");

    axum::serve(listener, http).await?;

    Ok(())
}

fn main() -> Result<()> {
    let conf = AppConfig::load().context("Failed to load configuration")?;

    let _guard = sentry::init((
        conf.sentry_dsn.clone(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: conf.sentry_traces_sample_rate,
            send_default_pii: false,
            attach_stacktrace: true,
            before_send: Some(crate::middleware::sentry_scrub::create_before_send()),
            ..Default::default()
        },
    ));

    // Errors become Sentry events, warnings only breadcrumbs
    let sentry_layer = sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=info,tower_http=warn,axum::rejection=warn,hyper=warn,reqwest=warn",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            main_impl(conf).await.inspect_err(|e| {
                sentry::integrations::anyhow::capture_anyhow(e);
                log::error!("Server stopped: {e:#}");
            })
        })
}

#[instrument]
async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
