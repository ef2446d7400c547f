use std::sync::Arc;

use sentry::protocol::{Event, Request as SentryRequest};
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

/// Substrings of field and header names whose values never leave the process.
/// Payout addresses and emails are personal data.
const SENSITIVE_FIELDS: &[&str] = &[
    "authorization",
    "bearer",
    "token",
    "api_key",
    "api-key",
    "secret",
    "password",
    "nowpayments-sig",
    "signature",
    "email",
    "address",
];

pub(crate) fn is_sensitive_field(field_name: &str) -> bool {
    let field_lower = field_name.to_lowercase();
    SENSITIVE_FIELDS
        .iter()
        .any(|sensitive| field_lower.contains(sensitive))
}

/// Replaces the value of every sensitive key, at any depth.
pub(crate) fn scrub_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_sensitive_field(key) {
                    *v = Value::String(REDACTED.to_string());
                } else {
                    scrub_json_value(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(scrub_json_value),
        _ => {}
    }
}

/// JSON bodies are scrubbed field by field; anything else that mentions a
/// sensitive name is dropped entirely.
pub(crate) fn scrub_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(mut json) => {
            scrub_json_value(&mut json);
            json.to_string()
        }
        Err(_) if SENSITIVE_FIELDS.iter().any(|f| body.to_lowercase().contains(f)) => {
            "[REDACTED - Contains sensitive data]".to_string()
        }
        Err(_) => body.to_string(),
    }
}

fn scrub_request(request: &mut SentryRequest) {
    for (name, value) in request.headers.iter_mut() {
        if is_sensitive_field(name) {
            *value = REDACTED.to_string();
        }
    }

    if let Some(query_string) = &request.query_string {
        if is_sensitive_field(query_string) {
            request.query_string = Some(REDACTED.to_string());
        }
    }

    if let Some(data) = &request.data {
        request.data = Some(scrub_body(data));
    }
}

/// Strips secrets and personal data from events before they are sent.
pub fn scrub_sensitive_data(mut event: Event<'static>) -> Option<Event<'static>> {
    if let Some(request) = &mut event.request {
        scrub_request(request);
    }

    event.extra.retain(|k, _| !is_sensitive_field(k));

    for context in event.contexts.values_mut() {
        if let sentry::protocol::Context::Other(map) = context {
            map.retain(|k, _| !is_sensitive_field(k));
        }
    }

    for breadcrumb in event.breadcrumbs.values.iter_mut() {
        breadcrumb.data.retain(|k, _| !is_sensitive_field(k));
        for value in breadcrumb.data.values_mut() {
            scrub_json_value(value);
        }
    }

    Some(event)
}

pub fn create_before_send() -> Arc<dyn Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync> {
    Arc::new(scrub_sensitive_data)
}
