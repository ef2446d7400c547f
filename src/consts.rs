pub const NOWPAYMENTS_API_URL: &str = "https://api.nowpayments.io/v1";

/// Header carrying the hex HMAC-SHA512 of an IPN body.
pub const NOWPAYMENTS_SIGNATURE_HEADER: &str = "x-nowpayments-sig";
pub const NOWPAYMENTS_API_KEY_HEADER: &str = "x-api-key";

/// Currencies a wallet can be topped up with.
pub const SUPPORTED_TOP_UP_CURRENCIES: [&str; 5] = ["usdttrc20", "usdterc20", "btc", "eth", "trx"];

/// Top-up amounts are always priced in this currency.
pub const PRICE_CURRENCY: &str = "usd";

pub const TOP_UP_ORDER_DESCRIPTION: &str = "Account top-up";

/// Upper bound of the random component of an order id.
pub const ORDER_ID_NONCE_MAX: u32 = 1_000_000;

pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
