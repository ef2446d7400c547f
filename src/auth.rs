use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::types::AccountId;

/// Constant time byte comparison.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Admin routes require `Authorization: Bearer <admin_token>`. An empty
/// configured token locks the admin routes entirely.
pub fn check_admin_auth(admin_token: &str, headers: &HeaderMap) -> AppResult<()> {
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::Unauthorized);
    };

    let mut expected = admin_token.to_string();
    expected.retain(|c| !c.is_whitespace());
    if expected.is_empty() || !constant_time_eq(expected.as_bytes(), token.as_bytes()) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub account_id: AccountId,
    pub aud: String,
    pub exp: usize,
}

pub fn verify_jwt(secret: &str, aud: &str, jwt: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[aud]);

    let data = jsonwebtoken::decode::<Claims>(
        jwt,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(data.claims)
}

/// Per-account routes require a bearer JWT whose `account_id` claim names the
/// account in the path. A token for another account gets the same 404 as a
/// missing account.
pub fn check_account_auth(
    config: &AppConfig,
    headers: &HeaderMap,
    account_id: AccountId,
) -> AppResult<()> {
    if config.jwt_secret.is_empty() {
        return Err(AppError::Unauthorized);
    }
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::Unauthorized);
    };

    let claims = verify_jwt(&config.jwt_secret, &config.jwt_audience, token).map_err(|e| {
        log::warn!("Rejected account token: {e}");
        AppError::Unauthorized
    })?;
    if claims.account_id != account_id {
        return Err(AppError::AccountNotFound(account_id));
    }
    Ok(())
}

/// Signed token for `account_id`, as the login service would issue it.
#[cfg(test)]
pub fn issue_test_token(secret: &str, aud: &str, account_id: AccountId, ttl_secs: i64) -> String {
    let claims = Claims {
        account_id,
        aud: aud.to_string(),
        exp: (chrono::Utc::now().timestamp() + ttl_secs) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
