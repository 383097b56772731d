/// Bearer token issuance and validation
///
/// Tokens are HS256 JWTs whose subject is the username. Two kinds exist:
///
/// - **access** tokens carry no scope and authenticate API calls
/// - **password reset** tokens carry `scope = "password_reset"`, live for
///   [`RESET_TOKEN_TTL_MINUTES`] and are accepted only by the reset endpoint
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use rentloop_shared::auth::jwt::{issue_access_token, validate_access_token};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let token = issue_access_token("ana", Duration::minutes(60), secret)?;
///
/// let claims = validate_access_token(&token, secret)?;
/// assert_eq!(claims.sub, "ana");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// `iss` claim of every token
pub const ISSUER: &str = "rentloop";

/// Lifetime of password reset tokens
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to create token: {0}")]
    CreateError(String),

    #[error("invalid token: {0}")]
    ValidationError(String),

    #[error("token has expired")]
    Expired,

    #[error("invalid token issuer")]
    InvalidIssuer,

    /// Token is genuine but not meant for this use
    #[error("token scope not accepted here")]
    WrongScope,
}

/// Restricts what a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    /// Absent on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<TokenScope>,
}

impl Claims {
    /// Claims for `username` valid from now for `ttl`
    pub fn new(username: impl Into<String>, ttl: Duration, scope: Option<TokenScope>) -> Self {
        let now = Utc::now();
        Self {
            sub: username.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: now.timestamp(),
            scope,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, zero if already expired
    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Issues an access token for `username`
pub fn issue_access_token(username: &str, ttl: Duration, secret: &str) -> Result<String, JwtError> {
    create_token(&Claims::new(username, ttl, None), secret)
}

/// Issues a short-lived password reset token for `username`
pub fn issue_reset_token(username: &str, secret: &str) -> Result<String, JwtError> {
    create_token(
        &Claims::new(
            username,
            Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            Some(TokenScope::PasswordReset),
        ),
        secret,
    )
}

/// Checks signature, issuer, `exp` and `nbf`, without looking at scope
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })
}

/// Validates a token for ordinary API access; scoped tokens are refused
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.scope.is_some() {
        return Err(JwtError::WrongScope);
    }
    Ok(claims)
}

/// Validates a password reset token
pub fn validate_reset_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.scope != Some(TokenScope::PasswordReset) {
        return Err(JwtError::WrongScope);
    }
    Ok(claims)
}
