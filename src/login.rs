//! Accounts, sessions and the `/api/auth` endpoints.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json, RequestPartsExt, Router,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, UserAgent, authorization::Bearer},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::app::SharedState;
use crate::error::{ApiError, ApiResult, JsonBody, ResultExt};
use crate::models::{Session, User, UserProfile};
use crate::response::ApiResponse;

/// Registration form. Every field is required; they are optional here so a
/// missing one is reported as a validation error rather than a parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Password change request for an authenticated user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: UserProfile,
    pub token: String,
}

/// Hash a password using Argon2
///
/// Creates a salted Argon2id hash in PHC string format.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Errors
/// * Returns an error if the password hashing fails
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Ok(true)` if the password matches, `Ok(false)` if it does not
///
/// # Errors
/// * Returns an error if the stored hash is not a valid PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate an opaque bearer token.
pub fn issue_token() -> String {
    Uuid::new_v4().to_string()
}

/// Store a session for `token`, valid for `ttl_days`.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: &str,
    token: &str,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
    ttl_days: i64,
) -> sqlx::Result<Session> {
    let now = Utc::now();
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_id, token, user_agent, ip_address, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(token)
    .bind(user_agent)
    .bind(ip_address)
    .bind(now + Duration::days(ttl_days))
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Look up the user behind a token.
///
/// # Returns
/// * `None` if the token is unknown or its session has expired
pub async fn validate_session(pool: &SqlitePool, token: &str) -> sqlx::Result<Option<User>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    match session {
        Some(session) if !session.is_expired(Utc::now()) => find_user(pool, &session.user_id).await,
        _ => Ok(None),
    }
}

pub async fn revoke_session(pool: &SqlitePool, token: &str) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

async fn find_user(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn find_user_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// The caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

#[axum::async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::unauthorized("Access token required"))?;
        let token = bearer.token().to_string();

        match validate_session(&state.pool, &token).await {
            Ok(Some(user)) => Ok(AuthUser { user, token }),
            Ok(None) => Err(ApiError::unauthorized("Invalid or expired token")),
            Err(e) => {
                log::error!("Session lookup failed: {}", e);
                Err(ApiError::Forbidden("Invalid token".to_string()))
            }
        }
    }
}

/// Client details recorded on a new session.
struct ClientInfo {
    user_agent: Option<String>,
    ip_address: Option<String>,
}

impl ClientInfo {
    fn new(user_agent: Option<TypedHeader<UserAgent>>, addr: Option<ConnectInfo<SocketAddr>>) -> Self {
        ClientInfo {
            user_agent: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
            ip_address: addr.map(|ConnectInfo(addr)| addr.ip().to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/me", get(handle_me))
        .route("/password", put(handle_change_password))
}

/// Create an account and log it in.
pub async fn handle_register(
    State(state): State<SharedState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    JsonBody(form): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
        non_empty(form.email),
        non_empty(form.password),
        non_empty(form.first_name),
        non_empty(form.last_name),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    const CONTEXT: &str = "Registration failed";
    let pool = &state.pool;

    if find_user_by_email(pool, &email).await.context_500(CONTEXT)?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password(&password).context_500(CONTEXT)?;
    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password, first_name, last_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&email)
    .bind(&password_hash)
    .bind(&first_name)
    .bind(&last_name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context_500(CONTEXT)?;

    let client = ClientInfo::new(user_agent, addr);
    let token = issue_token();
    create_session(
        pool,
        &user.id,
        &token,
        client.user_agent.as_deref(),
        client.ip_address.as_deref(),
        state.config.session_ttl_days,
    )
    .await
    .context_500(CONTEXT)?;

    log::info!("Registered user {}", user.id);
    let body = ApiResponse::ok(AuthPayload {
        user: user.into(),
        token,
    })
    .with_message("User registered successfully");
    Ok((StatusCode::CREATED, Json(body)))
}

/// Check credentials and issue a new token.
pub async fn handle_login(
    State(state): State<SharedState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    JsonBody(form): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(password)) = (non_empty(form.email), non_empty(form.password)) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    const CONTEXT: &str = "Login failed";
    let pool = &state.pool;

    let user = match find_user_by_email(pool, &email).await.context_500(CONTEXT)? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    if !verify_password(&password, &user.password).context_500(CONTEXT)? {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(now)
    .bind(now)
    .bind(&user.id)
    .fetch_one(pool)
    .await
    .context_500(CONTEXT)?;

    let client = ClientInfo::new(user_agent, addr);
    let token = issue_token();
    create_session(
        pool,
        &user.id,
        &token,
        client.user_agent.as_deref(),
        client.ip_address.as_deref(),
        state.config.session_ttl_days,
    )
    .await
    .context_500(CONTEXT)?;

    let body = ApiResponse::ok(AuthPayload {
        user: user.into(),
        token,
    })
    .with_message("Login successful");
    Ok(Json(body))
}

/// Revoke the token the request was made with.
pub async fn handle_logout(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    revoke_session(&state.pool, &auth.token)
        .await
        .context_500("Logout failed")?;
    Ok(Json(ApiResponse::message("Logout successful")))
}

pub async fn handle_me(auth: AuthUser) -> Json<ApiResponse<UserProfile>> {
    Json(ApiResponse::ok(auth.user.into()))
}

/// Change the caller's password and sign out their other sessions.
pub async fn handle_change_password(
    State(state): State<SharedState>,
    auth: AuthUser,
    JsonBody(form): JsonBody<PasswordChangeRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let (Some(current), Some(new_password)) =
        (non_empty(form.current_password), non_empty(form.new_password))
    else {
        return Err(ApiError::bad_request("Current and new password are required"));
    };

    const CONTEXT: &str = "Failed to change password";
    if !verify_password(&current, &auth.user.password).context_500(CONTEXT)? {
        return Err(ApiError::bad_request("Invalid current password"));
    }

    let password_hash = hash_password(&new_password).context_500(CONTEXT)?;
    let mut tx = state.pool.begin().await.context_500(CONTEXT)?;
    sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(auth.id())
        .execute(&mut *tx)
        .await
        .context_500(CONTEXT)?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token != ?")
        .bind(auth.id())
        .bind(&auth.token)
        .execute(&mut *tx)
        .await
        .context_500(CONTEXT)?;
    tx.commit().await.context_500(CONTEXT)?;

    Ok(Json(ApiResponse::message("Password changed successfully")))
}
