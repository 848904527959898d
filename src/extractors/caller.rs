//! Extract the caller's verified identity from request headers set by the identity service.

use crate::config::Role;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Header carrying the verified role claim (`Admin`, `Manager`, `Viewer`).
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// `(userId, role)` pair attached to every request by the identity service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?
            .to_string();
        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ROLE_HEADER)))?
            .parse::<Role>()
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(Caller { user_id, role })
    }
}
