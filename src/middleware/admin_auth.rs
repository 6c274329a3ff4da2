use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::extract_bearer_token;

/// Check the bearer token against `ADMIN_API_KEY`.
///
/// With no key configured the admin API is closed: every request is 401.
fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        tracing::debug!("Admin request rejected: ADMIN_API_KEY is not configured");
        return Err(AppError::Unauthorized);
    };
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    authenticate_admin(&state, request.headers())?;
    Ok(next.run(request).await)
}
