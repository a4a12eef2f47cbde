//! Admin bearer-token check

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::warn;

use crate::app::AppState;

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Admin access is disabled")]
    Disabled,

    #[error("Too many requests")]
    RateLimited,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Disabled => StatusCode::FORBIDDEN,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };

        (status, self.to_string()).into_response()
    }
}

/// Compare a presented token against the configured one
pub fn verify_admin_token(presented: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let expected = expected.ok_or(AuthError::Disabled)?;
    let presented = presented.ok_or(AuthError::MissingHeader)?;

    if presented.as_bytes() != expected.as_bytes() {
        return Err(AuthError::InvalidToken);
    }
    Ok(())
}

/// Middleware to require the admin bearer token
pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.admin_limiter.check().is_err() {
        return Err(AuthError::RateLimited);
    }

    let presented = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    if let Err(e) = verify_admin_token(presented, state.config.admin_token.as_deref()) {
        warn!(error = %e, path = %request.uri().path(), "Admin request rejected");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_token_check() {
        assert!(verify_admin_token(Some("abc"), Some("abc")).is_ok());
        assert!(matches!(
            verify_admin_token(Some("abd"), Some("abc")),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            verify_admin_token(None, Some("abc")),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            verify_admin_token(Some("abc"), None),
            Err(AuthError::Disabled)
        ));
    }
}
