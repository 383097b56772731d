/// Authentication endpoints
///
/// This module provides user identity endpoints:
/// - Signup
/// - Token issue (OAuth2 password form)
/// - Current user
/// - Password reset
///
/// # Endpoints
///
/// - `POST /v1/auth/signup` - Register new user
/// - `POST /v1/auth/token` - Exchange username/password for a bearer token
/// - `GET /v1/auth/me` (alias `/v1/auth/users/me`) - Current user
/// - `POST /v1/auth/password/forgot` - Issue a reset token
/// - `POST /v1/auth/password/reset` - Set a new password with a reset token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Form, Json};
use chrono::{DateTime, Utc};
use rentloop_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{NewUser, TakenField, User},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

/// Public view of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Token request (form-encoded, OAuth2 password grant shape)
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Always `bearer`
    pub token_type: String,

    /// Lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    /// Returned directly until e-mail delivery exists
    pub reset_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub new_password: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "username": "ana",
///   "email": "ana@example.com",
///   "password": "correct horse"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Username or email already registered
/// - `422 Unprocessable Entity`: Validation failed
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    req.validate()?;
    password::check_password_policy(&req.password)
        .map_err(|msg| ApiError::invalid_field("password", msg))?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    // The unique indexes still decide concurrent signups
    match User::find_taken(&state.db, &username, &email).await? {
        Some(TakenField::Username) => {
            return Err(ApiError::Conflict("Username already registered".to_string()))
        }
        Some(TakenField::Email) => {
            return Err(ApiError::Conflict("Email already registered".to_string()))
        }
        None => {}
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username,
            email,
            password_hash,
        },
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Issue an access token
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/token
/// Content-Type: application/x-www-form-urlencoded
///
/// username=ana&password=correct+horse
/// ```
///
/// # Response
///
/// ```json
/// { "access_token": "eyJ...", "token_type": "bearer", "expires_in": 3600 }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Incorrect username or password
pub async fn token(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized("Incorrect username or password".to_string());

    let user = User::find_by_username(&state.db, req.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let ttl = state.config.access_token_ttl();
    let access_token = jwt::issue_access_token(&user.username, ttl, state.jwt_secret())?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: ttl.num_seconds(),
    }))
}

/// Current user
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or invalid token, or the account is gone
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_username(&state.db, &auth.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    Ok(Json(user.into()))
}

/// Issue a password reset token
///
/// The token is scoped to password reset and expires after
/// [`jwt::RESET_TOKEN_TTL_MINUTES`] minutes.
///
/// # Errors
///
/// - `404 Not Found`: Unknown username
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    let user = User::find_by_username(&state.db, req.username.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let reset_token = jwt::issue_reset_token(&user.username, state.jwt_secret())?;
    info!(username = %user.username, "Password reset token issued");

    Ok(Json(ForgotPasswordResponse { reset_token }))
}

/// Set a new password
///
/// # Errors
///
/// - `400 Bad Request`: Token invalid, expired or not a reset token
/// - `422 Unprocessable Entity`: New password fails the policy
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;

    let claims = jwt::validate_reset_token(&req.token, state.jwt_secret())
        .map_err(|_| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    password::check_password_policy(&req.new_password)
        .map_err(|msg| ApiError::invalid_field("new_password", msg))?;

    let password_hash = password::hash_password(&req.new_password)?;
    if !User::update_password(&state.db, &claims.sub, &password_hash).await? {
        return Err(ApiError::BadRequest("Invalid or expired reset token".to_string()));
    }

    info!(username = %claims.sub, "Password reset");
    Ok(StatusCode::NO_CONTENT)
}
