//! Owner resolution for incoming requests.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

use crate::conversations::core::owner::{Owner, is_valid_username};

/// Header carrying the authenticated username.
pub const USER_HEADER: &str = "x-parlor-user";
/// Header carrying the anonymous session handle.
pub const SESSION_HEADER: &str = "x-parlor-session";

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.trim().is_empty())
        };

        let username = header(USER_HEADER);
        if let Some(user) = username.filter(|user| !is_valid_username(user)) {
            return Err((StatusCode::UNAUTHORIZED, format!("Invalid username: {user}")));
        }

        Owner::resolve(username, header(SESSION_HEADER))
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}
