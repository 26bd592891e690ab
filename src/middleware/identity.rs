use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the caller's user ID, set by the upstream auth gateway
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, extracted from [`USER_ID_HEADER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(UserId)
            .ok_or_else(|| AppError::Unauthorized(format!("invalid {} header", USER_ID_HEADER)))
    }
}
