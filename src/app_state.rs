use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::payments::NowPaymentsClient;
use crate::store::{RedisMirror, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub payments: NowPaymentsClient,
}

impl AppState {
    pub async fn new(app_config: AppConfig) -> Result<Self> {
        let store = init_store(&app_config).await?;
        let payments = NowPaymentsClient::from_config(&app_config)?;

        if app_config.admin_token.trim().is_empty() {
            log::warn!("Admin token is not configured, admin routes will reject every request");
        }
        if app_config.jwt_secret.is_empty() {
            log::warn!("JWT secret is not configured, account routes will reject every request");
        }
        if app_config.nowpayments.ipn_secret.is_empty() {
            log::warn!("IPN secret is not configured, payment callbacks will be rejected");
        }

        Ok(AppState {
            config: app_config,
            store,
            payments,
        })
    }

    /// In-memory state pointed at a mock provider.
    #[cfg(test)]
    pub fn for_tests(api_url: &str) -> Self {
        let config = AppConfig::for_tests(api_url);
        let payments = NowPaymentsClient::from_config(&config).expect("test payments client");
        AppState {
            config,
            store: Store::in_memory(),
            payments,
        }
    }
}

async fn init_store(app_config: &AppConfig) -> Result<Store> {
    let Some(redis_url) = app_config.redis_url.as_deref() else {
        log::info!("No redis url configured, keeping the store in memory");
        return Ok(Store::in_memory());
    };

    let mirror = RedisMirror::connect(redis_url, app_config.redis_key_prefix.clone())
        .await
        .context("Failed to connect to redis")?;
    Store::with_redis_mirror(mirror)
        .await
        .context("Failed to load store from redis")
}
