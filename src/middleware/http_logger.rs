use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{json, Value};

use super::sentry_scrub::{is_sensitive_field, scrub_body};
use crate::consts::MAX_REQUEST_BODY_BYTES;

/// Largest body excerpt attached to a breadcrumb.
const BODY_CAPTURE_LIMIT: usize = 10 * 1024;

fn is_textual(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("json") || ct.contains("text"))
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Records every request as a Sentry breadcrumb. Bodies are only kept for
/// responses with status >= 400, and always scrubbed first.
pub async fn http_logging_middleware(
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_headers = safe_headers(req.headers());

    let (req, request_body) = if is_textual(content_type(req.headers()).as_deref()) {
        let (parts, body) = req.into_parts();
        let bytes = buffer_request(body).await?;
        (Request::from_parts(parts, Body::from(bytes.clone())), Some(bytes))
    } else {
        (req, None)
    };

    let res = next.run(req).await;
    let status = res.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if !status.is_client_error() && !status.is_server_error() {
        add_breadcrumb(
            "http.request",
            format!("{method} {path} {} ({duration_ms}ms)", status.as_u16()),
            json!({
                "method": method.as_str(),
                "url": path,
                "status_code": status.as_u16(),
                "duration_ms": duration_ms,
            }),
            sentry::Level::Info,
        );
        return Ok(res);
    }

    let response_headers = safe_headers(res.headers());
    let (res, response_body) = if is_textual(content_type(res.headers()).as_deref()) {
        let (parts, body) = res.into_parts();
        let bytes = buffer(body).await.map_err(|e| {
            log::warn!("Failed to buffer response body: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process response".to_string(),
            )
        })?;
        (Response::from_parts(parts, Body::from(bytes.clone())), Some(bytes))
    } else {
        (res, None)
    };

    add_breadcrumb(
        "http.request",
        format!("{method} {path}"),
        with_body(
            json!({
                "method": method.as_str(),
                "url": path,
                "headers": request_headers,
            }),
            request_body.as_ref(),
        ),
        sentry::Level::Info,
    );

    let level = if status.is_server_error() {
        sentry::Level::Error
    } else {
        sentry::Level::Warning
    };
    add_breadcrumb(
        "http.response",
        format!("HTTP {} ({duration_ms}ms)", status.as_u16()),
        with_body(
            json!({
                "status_code": status.as_u16(),
                "duration_ms": duration_ms,
                "headers": response_headers,
            }),
            response_body.as_ref(),
        ),
        level,
    );

    Ok(res)
}

/// Reads at most `MAX_REQUEST_BODY_BYTES`; a longer body is answered with 413
/// without being read to the end.
async fn buffer_request(body: Body) -> Result<Bytes, (StatusCode, String)> {
    match Limited::new(body, MAX_REQUEST_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
        )),
        Err(e) => {
            log::warn!("Failed to buffer request body: {e}");
            Err((StatusCode::BAD_REQUEST, "Failed to read request body".to_string()))
        }
    }
}

async fn buffer(body: Body) -> Result<Bytes, axum::Error> {
    Ok(body.collect().await?.to_bytes())
}

/// Header map for breadcrumbs with credentials and signatures redacted.
fn safe_headers(headers: &HeaderMap) -> BTreeMap<String, Value> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().to_string();
            if is_sensitive_field(&name) {
                return Some((name, json!("[REDACTED]")));
            }
            value.to_str().ok().map(|v| (name, json!(v)))
        })
        .collect()
}

/// Body excerpt, truncated and scrubbed.
fn body_preview(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let excerpt = &bytes[..bytes.len().min(BODY_CAPTURE_LIMIT)];
    match std::str::from_utf8(excerpt) {
        Ok(text) => Some(scrub_body(text)),
        Err(_) => Some(format!("[Binary data, {} bytes]", bytes.len())),
    }
}

fn with_body(mut data: Value, body: Option<&Bytes>) -> Value {
    if let Some(preview) = body.and_then(body_preview) {
        data["body"] = json!(preview);
    }
    data
}

fn add_breadcrumb(category: &str, message: String, data: Value, level: sentry::Level) {
    let data = match data {
        Value::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };
    sentry::add_breadcrumb(sentry::Breadcrumb {
        ty: "http".to_string(),
        category: Some(category.to_string()),
        message: Some(message),
        data,
        level,
        ..Default::default()
    });
}
