use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::consts::NOWPAYMENTS_API_URL;

#[derive(Debug, Clone, Deserialize)]
pub struct NowPaymentsConfig {
    pub api_url: String,
    pub api_key: String,
    /// Shared secret for `x-nowpayments-sig`.
    pub ipn_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    /// Externally reachable base url, used to build the IPN callback url.
    pub public_base_url: String,
    pub admin_token: String,
    /// HS256 key for account bearer tokens. Empty rejects every account token.
    pub jwt_secret: String,
    /// Expected `aud` claim of account tokens.
    pub jwt_audience: String,
    pub sentry_dsn: Option<String>,
    pub sentry_traces_sample_rate: f32,
    /// Store is kept in memory only when unset.
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub nowpayments: NowPaymentsConfig,
}

impl AppConfig {
    /// Reads `config.toml` (optional) and `REEL_*` environment overrides,
    /// e.g. `REEL_NOWPAYMENTS__IPN_SECRET`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("REEL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("listen_addr", "0.0.0.0:8000")?
            .set_default("public_base_url", "http://localhost:8000")?
            .set_default("admin_token", "")?
            .set_default("jwt_secret", "")?
            .set_default("jwt_audience", "reel-ledger")?
            .set_default("sentry_traces_sample_rate", 0.5)?
            .set_default("redis_key_prefix", "reel")?
            .set_default("nowpayments.api_url", NOWPAYMENTS_API_URL)?
            .set_default("nowpayments.api_key", "")?
            .set_default("nowpayments.ipn_secret", "")?)
    }

    pub fn ipn_callback_url(&self) -> String {
        format!(
            "{}/api/v1/wallet/ipn_callback",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(api_url: &str) -> Self {
        Self {
            listen_addr: "127.0.0.1:0".into(),
            public_base_url: "https://reel.test/".into(),
            admin_token: "test-admin-token".into(),
            jwt_secret: "test-jwt-secret".into(),
            jwt_audience: "reel-ledger".into(),
            sentry_dsn: None,
            sentry_traces_sample_rate: 0.0,
            redis_url: None,
            redis_key_prefix: "reel".into(),
            nowpayments: NowPaymentsConfig {
                api_url: api_url.into(),
                api_key: "test-api-key".into(),
                ipn_secret: "test-ipn-secret".into(),
            },
        }
    }
}
