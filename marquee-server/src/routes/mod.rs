use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        chat, folders, health, metadata, settings, sources, visitors, watch_history,
        watchlist,
    },
    infra::{
        app_state::AppState,
        config::CorsConfig,
        errors::AppError,
        middleware::{maintenance_middleware, rate_limit_middleware},
        websocket::watch_party_handler,
    },
    users::{
        admin_handlers,
        auth::{
            self, admin_middleware, auth_middleware, beacon_auth_middleware,
            optional_auth_middleware,
        },
        source_handlers, user_handlers,
    },
};

/// Every `/api` route, without the outer layers.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/signup", post(auth::handlers::signup))
        .route("/api/auth/login", post(auth::handlers::login))
        .route("/api/settings/maintenance", get(settings::get_maintenance))
        .route("/api/sources", get(sources::list_sources))
        .route(
            "/api/embed/{source}/{media_type}/{media_id}",
            get(sources::embed_url),
        )
        .route("/api/search", get(metadata::search))
        .route("/api/trending", get(metadata::trending))
        .route("/api/metadata/{media_type}/{id}", get(metadata::details))
        .route(
            "/api/metadata/{media_type}/{id}/recommendations",
            get(metadata::recommendations),
        )
        .route(
            "/api/metadata/{media_type}/{id}/season/{season}",
            get(metadata::season),
        )
        .route("/api/watch-party/ws", get(watch_party_handler))
        .merge(create_visitor_routes(state.clone()))
        .merge(create_beacon_routes(state.clone()))
        .merge(create_protected_routes(state.clone()))
        .merge(create_admin_routes(state))
}

/// Visitor logging accepts anonymous and signed-in callers alike.
fn create_visitor_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/visitors/log", post(visitors::log_visit))
        .route_layer(middleware::from_fn_with_state(
            state,
            optional_auth_middleware,
        ))
}

/// Page-unload beacon; the token may ride in the query string.
fn create_beacon_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/watch-history/flush", post(watch_history::flush_playtime))
        .route_layer(middleware::from_fn_with_state(
            state,
            beacon_auth_middleware,
        ))
}

fn create_protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(user_handlers::get_current_user))
        .route("/api/users/me/image", put(user_handlers::update_profile_image))
        .route(
            "/api/user/source",
            get(source_handlers::get_last_used_source)
                .post(source_handlers::update_last_used_source),
        )
        .route(
            "/api/watch-history",
            get(watch_history::list_watch_history)
                .post(watch_history::save_watch_progress)
                .delete(watch_history::clear_watch_history),
        )
        .route(
            "/api/watch-history/playtime",
            post(watch_history::enqueue_playtime),
        )
        .route(
            "/api/watch-history/entries/{id}",
            delete(watch_history::delete_history_entry),
        )
        .route(
            "/api/watch-history/{media_type}/{media_id}",
            get(watch_history::get_title_history)
                .delete(watch_history::delete_title_history),
        )
        .route(
            "/api/watchlist",
            get(watchlist::list_watchlist).post(watchlist::add_to_watchlist),
        )
        .route(
            "/api/watchlist/folders",
            get(folders::list_folders).post(folders::create_folder),
        )
        .route(
            "/api/watchlist/folders/{id}",
            patch(folders::rename_folder).delete(folders::delete_folder),
        )
        .route(
            "/api/watchlist/entries/{id}/folder",
            patch(watchlist::move_watchlist_entry),
        )
        .route(
            "/api/watchlist/{media_type}/{media_id}",
            get(watchlist::get_watchlist_status)
                .delete(watchlist::remove_from_watchlist),
        )
        .route("/api/chat", post(chat::chat))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn create_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(admin_handlers::list_users))
        .route(
            "/api/admin/users/{id}/role",
            patch(admin_handlers::update_user_role),
        )
        .route("/api/admin/users/{id}", delete(admin_handlers::delete_user))
        .route("/api/admin/maintenance", put(admin_handlers::update_maintenance))
        .route(
            "/api/admin/visitors",
            get(admin_handlers::list_visitor_logs)
                .delete(admin_handlers::clear_visitor_logs),
        )
        .route(
            "/api/admin/playtime/queue",
            get(admin_handlers::playtime_queue_status),
        )
        // Layers run outermost-last: authenticate, then check the role.
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Permissive in dev, allow-list otherwise.
pub fn build_cors_layer(cors: &CorsConfig, dev_mode: bool) -> CorsLayer {
    if dev_mode {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter(|origin| origin.trim() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();
    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.trim().as_bytes()).ok())
        .collect();
    let headers: Vec<HeaderName> = cors
        .allowed_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.trim().as_bytes()).ok())
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::list(headers));

    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}

async fn route_not_found() -> AppError {
    AppError::not_found("Route not found")
}

/// The full application: routes plus maintenance gating, rate limiting,
/// tracing and CORS.
pub fn create_app(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.cors, state.config.dev_mode);

    // Outermost first: CORS, tracing, rate limiting, maintenance gate.
    // Applied innermost-first via `Router::layer` so each layer sees an
    // axum `Body` (CORS requires a `Default` response body).
    create_api_router(state.clone())
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            maintenance_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/ping")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    fn ping_router(cors: &CorsConfig, dev_mode: bool) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_cors_layer(cors, dev_mode))
    }

    #[tokio::test]
    async fn cors_allow_list_only_echoes_known_origins() {
        let cors = CorsConfig::default();

        let allowed = ping_router(&cors, false)
            .oneshot(preflight("http://localhost:5173"))
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );

        let denied = ping_router(&cors, false)
            .oneshot(preflight("https://evil.example"))
            .await
            .unwrap();
        assert!(
            !denied
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn dev_mode_cors_is_permissive() {
        let response = ping_router(&CorsConfig::default(), true)
            .oneshot(preflight("https://anywhere.example"))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
