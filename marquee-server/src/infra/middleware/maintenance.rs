use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::infra::{app_state::AppState, errors::ApiResponse};
use crate::users::auth::middleware::{bearer_token, validate_and_get_user};

const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "Marquee is down for maintenance. Please check back soon.";

/// Paths that stay reachable while maintenance mode is on, so admins can
/// sign in and turn it off.
const EXEMPT_PREFIXES: [&str; 3] = ["/api/auth", "/api/settings", "/api/health"];

fn is_exempt(path: &str) -> bool {
    !path.starts_with("/api")
        || EXEMPT_PREFIXES.iter().any(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
}

/// Answer 503 to non-admin API calls while maintenance mode is enabled.
pub async fn maintenance_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    let settings = match state.unit_of_work.settings.get_or_create().await {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = %err, "could not read maintenance flag");
            return next.run(req).await;
        }
    };
    if !settings.maintenance_mode {
        return next.run(req).await;
    }

    if let Some(token) = bearer_token(req.headers())
        && let Ok(user) = validate_and_get_user(&state, token).await
        && user.is_admin()
    {
        return next.run(req).await;
    }

    let message = settings
        .maintenance_message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MAINTENANCE_MESSAGE.to_string());
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_settings_and_health_stay_open() {
        assert!(is_exempt("/api/auth/login"));
        assert!(is_exempt("/api/settings"));
        assert!(is_exempt("/api/health"));
        assert!(is_exempt("/"));
        assert!(!is_exempt("/api/authz"));
        assert!(!is_exempt("/api/watchlist"));
    }
}
