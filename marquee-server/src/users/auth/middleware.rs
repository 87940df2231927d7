use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use marquee_model::User;

use crate::infra::{
    app_state::AppState,
    errors::{ApiResponse, AppError},
};

/// Require a valid bearer token and expose the caller as `Extension<User>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    let user = validate_and_get_user(&state, token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// [`auth_middleware`] for the unload beacon, which may carry its token as
/// `?token=` because `navigator.sendBeacon` cannot set headers.
pub async fn beacon_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_owned(),
        None => query_token(request.uri())
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?,
    };
    let user = validate_and_get_user(&state, &token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attach the caller when a valid token is present, otherwise pass through.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers())
        && let Ok(user) = validate_and_get_user(&state, token).await
    {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

/// Must run after [`auth_middleware`].
pub async fn admin_middleware(request: Request, next: Next) -> Response {
    let Some(user) = request.extensions().get::<User>() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                "Authentication required".to_string(),
            )),
        )
            .into_response();
    };

    if !user.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error("Admin access required".to_string())),
        )
            .into_response();
    }

    next.run(request).await
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub fn query_token(uri: &Uri) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.trim().to_owned())
        .filter(|token| !token.is_empty())
}

pub async fn validate_and_get_user(
    state: &AppState,
    token: &str,
) -> Result<User, AppError> {
    let claims = state
        .tokens
        .validate(token)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    state
        .unit_of_work
        .users
        .get_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))
}
