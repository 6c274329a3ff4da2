//! Caller identity from the auth provider's access tokens.
//!
//! Authentication itself lives with the external provider. The storefront
//! forwards the provider's HS256 access token; we only verify it with the
//! shared secret and read the `sub` claim as the owning user id.

use axum::http::HeaderMap;
use jwt_simple::prelude::*;

use crate::error::{AppError, Result};
use crate::util::extract_bearer_token;

/// Resolve the optional caller identity for a request.
///
/// - no bearer token: anonymous (`Ok(None)`)
/// - no secret configured: tokens are ignored, anonymous
/// - valid token without `sub` (e.g. the provider's anonymous key): anonymous
/// - valid token with `sub`: `Ok(Some(sub))`
/// - invalid or expired token: `Unauthorized`
pub fn caller_identity(headers: &HeaderMap, secret: Option<&str>) -> Result<Option<String>> {
    let Some(token) = extract_bearer_token(headers) else {
        return Ok(None);
    };
    let Some(secret) = secret else {
        tracing::debug!("Ignoring bearer token: AUTH_JWT_SECRET is not configured");
        return Ok(None);
    };

    let key = HS256Key::from_bytes(secret.as_bytes());
    let claims = key.verify_token::<NoCustomClaims>(token, None).map_err(|e| {
        tracing::debug!("Rejected caller token: {}", e);
        AppError::Unauthorized
    })?;

    Ok(claims.subject.filter(|sub| !sub.is_empty()))
}
