use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
};
use tracing::debug;

use roadeye_types::api::{Claims, TokenKind};

use crate::session::SessionIssuer;
use crate::{ApiError, AppState};

/// Checks an `Authorization` header value and returns the caller's claims.
///
/// Only access tokens pass. Expired and forged tokens get the same
/// client-facing message.
pub fn authenticate(header: Option<&HeaderValue>, sessions: &SessionIssuer) -> Result<Claims, ApiError> {
    let raw = header
        .ok_or_else(|| ApiError::Unauthorized("Authorization header required".into()))?;

    let token = raw
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.contains(' '))
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header format".into()))?;

    sessions.validate_kind(token, TokenKind::Access).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized("Invalid or expired token".into())
    })
}

/// Extractor for protected handlers: the identity of the bearer.
pub struct Authenticated(pub Claims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts.headers.get(header::AUTHORIZATION), &state.sessions).map(Authenticated)
    }
}
