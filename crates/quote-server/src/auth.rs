//! Bearer Auth Middleware
//!
//! Verifies `Authorization: Bearer <jwt>` and stores the claims as a request
//! extension for protected handlers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Token part of a bearer header; scheme match is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ApiError::MissingToken)?;

    let claims = state.tokens.verify(token).map_err(|_| ApiError::InvalidToken)?;
    if claims.user_id <= 0 || claims.email.is_empty() {
        return Err(ApiError::InvalidToken);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
