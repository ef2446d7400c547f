use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::wallet::types::PaymentStatus;

/// NOWPayments sends `payment_id` as a number in IPN bodies and as a string
/// in some API responses; both are kept as text.
pub(crate) fn payment_id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPaymentId {
        Number(u64),
        Text(String),
    }

    Ok(match RawPaymentId::deserialize(deserializer)? {
        RawPaymentId::Number(n) => n.to_string(),
        RawPaymentId::Text(s) => s,
    })
}

/// Body of `POST /payment`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price_amount: Decimal,
    pub price_currency: String,
    pub pay_currency: String,
    pub ipn_callback_url: String,
    pub order_id: String,
    pub order_description: String,
}

/// Payment routing details returned by the provider and handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    #[serde(deserialize_with = "payment_id_from_number_or_string")]
    pub payment_id: String,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
    pub pay_address: String,
    pub price_amount: Decimal,
    pub price_currency: String,
    #[serde(default)]
    pub pay_amount: Option<Decimal>,
    pub pay_currency: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub expiration_estimate_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProviderError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
