//! Instant payment notifications (IPN) posted by NOWPayments.
//!
//! The provider signs the JSON body after sorting its keys and dropping all
//! whitespace, so the received body is re-serialized the same way before the
//! HMAC-SHA512 is computed.

use std::fmt::Write;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use super::types::payment_id_from_number_or_string;
use crate::auth::constant_time_eq;
use crate::error::{AppError, AppResult};
use crate::wallet::types::PaymentStatus;

type HmacSha512 = Hmac<Sha512>;

/// Fields of an IPN body the ledger acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct IpnPayload {
    #[serde(deserialize_with = "payment_id_from_number_or_string")]
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub pay_currency: Option<String>,
}

/// Compact JSON with object keys sorted at every depth and every non-ASCII
/// character written as a `\uXXXX` escape.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

fn expected_signature(secret: &str, message: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
pub fn sign(secret: &str, message: &[u8]) -> String {
    expected_signature(secret, message).unwrap()
}

/// True iff `provided_signature` is the hex HMAC-SHA512 of `message` under `secret_key`.
pub fn verify_callback_signature(secret_key: &str, provided_signature: &str, message: &[u8]) -> bool {
    let Some(expected) = expected_signature(secret_key, message) else {
        return false;
    };
    constant_time_eq(
        expected.as_bytes(),
        provided_signature.trim().to_ascii_lowercase().as_bytes(),
    )
}

/// Checks the signature of a raw IPN body and parses it. Fails closed: no
/// secret, no signature or a mismatch all reject the callback.
pub fn parse_verified_callback(
    secret_key: &str,
    signature: Option<&str>,
    body: &[u8],
) -> AppResult<IpnPayload> {
    let signature = signature.ok_or(AppError::MissingSignature)?;
    if secret_key.is_empty() {
        log::error!("IPN secret is not configured, rejecting callback");
        return Err(AppError::SignatureInvalid);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("callback body is not JSON: {e}")))?;
    let message = canonical_json(&value);

    if !verify_callback_signature(secret_key, signature, message.as_bytes()) {
        return Err(AppError::SignatureInvalid);
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::InvalidInput(format!("malformed callback: {e}")))
}
