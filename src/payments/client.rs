use std::time::Duration;

use anyhow::Context;
use http::{HeaderMap, HeaderValue};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::instrument;

use super::types::{PaymentDetails, PaymentRequest, ProviderError};
use crate::config::AppConfig;
use crate::consts::{NOWPAYMENTS_API_KEY_HEADER, PRICE_CURRENCY, TOP_UP_ORDER_DESCRIPTION};
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct NowPaymentsClient {
    client: Client,
    api_url: String,
    ipn_callback_url: String,
}

impl NowPaymentsClient {
    pub fn new(api_url: &str, api_key: &str, ipn_callback_url: String) -> anyhow::Result<Self> {
        let mut key: HeaderValue = api_key
            .parse()
            .context("Invalid NOWPayments api key")?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(NOWPAYMENTS_API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create NOWPayments client")?;

        let api_url = api_url.trim_end_matches('/').to_string();
        log::info!("NOWPayments client initialized with base URL: {api_url}");

        Ok(Self {
            client,
            api_url,
            ipn_callback_url,
        })
    }

    pub fn from_config(conf: &AppConfig) -> anyhow::Result<Self> {
        if conf.nowpayments.api_key.is_empty() {
            log::warn!("NOWPayments api key is not configured, top-ups will be rejected upstream");
        }
        Self::new(
            &conf.nowpayments.api_url,
            &conf.nowpayments.api_key,
            conf.ipn_callback_url(),
        )
    }

    /// Asks the provider for a new payment priced in USD. Any transport
    /// failure, non-2xx status or unreadable body is reported as an upstream
    /// error; nothing is retried.
    #[instrument(skip(self))]
    pub async fn create_payment(
        &self,
        order_id: &str,
        amount: Decimal,
        pay_currency: &str,
    ) -> AppResult<PaymentDetails> {
        let request = PaymentRequest {
            price_amount: amount,
            price_currency: PRICE_CURRENCY.to_string(),
            pay_currency: pay_currency.to_string(),
            ipn_callback_url: self.ipn_callback_url.clone(),
            order_id: order_id.to_string(),
            order_description: TOP_UP_ORDER_DESCRIPTION.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/payment", self.api_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                log::error!("NOWPayments request failed: {e}");
                AppError::UpstreamGateway(format!("payment provider unreachable: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamGateway(format!("failed to read provider response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(|e| match (e.code, e.message) {
                    (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                    (None, Some(message)) => Some(message),
                    _ => None,
                })
                .unwrap_or(body);
            log::error!("NOWPayments rejected order {order_id} with {status}: {message}");
            return Err(AppError::UpstreamGateway(message));
        }

        serde_json::from_str::<PaymentDetails>(&body).map_err(|e| {
            log::error!("Unexpected NOWPayments response for order {order_id}: {e}");
            AppError::UpstreamGateway(format!("unexpected provider response: {e}"))
        })
    }
}
