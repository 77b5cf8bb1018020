//! Request authentication.
//!
//! Session handling lives in a fronting gateway; this service trusts an
//! opaque user id forwarded in a header. Handlers take an [`AuthUser`]
//! argument and the extractor rejects unauthenticated requests with 401
//! before the handler body runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;

/// Header carrying the opaque id of the authenticated user.
pub const SESSION_HEADER: &str = "x-session-user";

/// The authenticated caller's opaque user id.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| AuthUser(v.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}
