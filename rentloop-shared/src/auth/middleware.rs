/// Bearer authentication for axum handlers
///
/// The API installs a layer that calls [`authenticate_bearer`] on every
/// request carrying an `Authorization` header and stores the resulting
/// [`AuthContext`] in the request extensions. Handlers that need a user take
/// `AuthContext` as an argument; it rejects with 401 when the request was
/// anonymous.
///
/// # Example
///
/// ```
/// use rentloop_shared::auth::middleware::AuthContext;
///
/// async fn whoami(auth: AuthContext) -> String {
///     format!("hello {}", auth.username)
/// }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::jwt::{validate_access_token, JwtError};

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token rejected
    InvalidToken(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Not authenticated"),
            AuthError::InvalidFormat(msg) => write!(f, "{}", msg),
            AuthError::InvalidToken(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": self.to_string(),
            })),
        )
            .into_response();

        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static("Bearer"),
        );
        response
    }
}

/// Validates the bearer token in `headers`
///
/// Returns `Ok(None)` for anonymous requests.
pub fn authenticate_bearer(
    headers: &HeaderMap,
    secret: &str,
) -> Result<Option<AuthContext>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Malformed authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
        JwtError::WrongScope => AuthError::InvalidToken("Token not valid for API access".to_string()),
        _ => AuthError::InvalidToken("Could not validate credentials".to_string()),
    })?;

    Ok(Some(AuthContext {
        username: claims.sub,
    }))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{issue_access_token, issue_reset_token};
    use axum::http::HeaderValue;
    use chrono::Duration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_anonymous_request() {
        assert_eq!(authenticate_bearer(&HeaderMap::new(), SECRET), Ok(None));
    }

    #[test]
    fn test_valid_bearer() {
        let token = issue_access_token("ana", Duration::minutes(5), SECRET).unwrap();
        let ctx = authenticate_bearer(&headers_with(&format!("Bearer {}", token)), SECRET)
            .unwrap()
            .unwrap();
        assert_eq!(ctx.username, "ana");
    }

    #[test]
    fn test_wrong_scheme() {
        assert!(matches!(
            authenticate_bearer(&headers_with("Basic YW5hOnB3"), SECRET),
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_reset_token_rejected() {
        let token = issue_reset_token("ana", SECRET).unwrap();
        assert!(matches!(
            authenticate_bearer(&headers_with(&format!("Bearer {}", token)), SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_rejection_is_401() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
