//! Bearer token extraction for the on-demand trigger.
//!
//! When `AUTH_SECRET` is set, requests must carry `Authorization: Bearer
//! <secret>`. Without a secret every caller is accepted.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller allowed to trigger runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// No secret configured
    Anonymous,
    /// Presented the configured secret
    Operator,
}

impl AuthUser {
    /// Check an `Authorization` header value against the configured secret.
    pub fn authorize(header: Option<&str>, secret: Option<&str>) -> Result<Self, AppError> {
        let Some(secret) = secret else {
            return Ok(AuthUser::Anonymous);
        };

        let header = header.ok_or(AppError::Unauthorized("Missing authorization header"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Invalid authorization header format"))?;

        if token.is_empty() {
            return Err(AppError::Unauthorized("Empty bearer token"));
        }
        if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
            return Err(AppError::Unauthorized("Invalid token"));
        }

        Ok(AuthUser::Operator)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        AuthUser::authorize(header, state.config.auth_secret.as_deref())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
