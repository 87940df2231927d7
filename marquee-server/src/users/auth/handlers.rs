use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use marquee_core::auth::AuthCrypto;
use marquee_model::{AuthProvider, User, UserRole};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError, AppResult},
};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        });
    if !valid {
        return Err(AppError::bad_request("A valid email address is required"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::bad_request(format!(
            "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn normalize_username(raw: Option<String>) -> Result<Option<String>, AppError> {
    let Some(name) = raw.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
    else {
        return Ok(None);
    };
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request(format!(
            "Username is limited to {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(Some(name))
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_password(
    crypto: Arc<AuthCrypto>,
    password: Zeroizing<String>,
) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || crypto.hash_password(&password))
        .await
        .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))??;
    Ok(hash)
}

async fn verify_password(
    crypto: Arc<AuthCrypto>,
    password: Zeroizing<String>,
    hash: String,
) -> AppResult<bool> {
    let matches =
        tokio::task::spawn_blocking(move || crypto.verify_password(&password, &hash))
            .await
            .map_err(|e| {
                AppError::internal(format!("Password check task failed: {e}"))
            })??;
    Ok(matches)
}

fn issue_token(state: &AppState, user: &User) -> AppResult<String> {
    state.tokens.issue(user.id).map_err(|e| {
        tracing::error!(error = %e, "failed to sign token");
        AppError::internal("Failed to generate access token")
    })
}

/// Create a credentials account. The first account becomes the admin.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let password = Zeroizing::new(request.password);
    let email = normalize_email(&request.email)?;
    validate_password(&password)?;
    let username = normalize_username(request.username)?;

    let users = &state.unit_of_work.users;
    if users.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("An account with this email already exists"));
    }
    let first_account = users.list_users().await?.is_empty();

    let password_hash =
        hash_password(state.auth_crypto.clone(), password).await?;
    let mut user = User::new(
        email,
        username,
        Some(password_hash),
        AuthProvider::Credentials,
    );
    if first_account {
        user.role = UserRole::Admin;
    }
    users.create_user(&user).await?;
    info!(user_id = %user.id, admin = first_account, "account created");

    let token = issue_token(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthResponse { token, user })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let invalid = || AppError::unauthorized("Invalid email or password");
    let password = Zeroizing::new(request.password);

    let email = normalize_email(&request.email).map_err(|_| invalid())?;
    let user = state
        .unit_of_work
        .users
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    let Some(hash) = user.password_hash.clone() else {
        return Err(invalid());
    };

    if !verify_password(state.auth_crypto.clone(), password, hash).await? {
        return Err(invalid());
    }

    let token = issue_token(&state, &user)?;
    Ok(Json(ApiResponse::success(AuthResponse { token, user })))
}
