#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum_test::TestServer;
use marquee_core::{
    application::unit_of_work::AppUnitOfWork,
    auth::AuthCrypto,
    providers::{
        ChatBackend, ChatMessage, ChatReply, ChatRequest, ChatRole, MetadataProvider,
        ProviderError, TrendingWindow,
    },
    rate_limit::InMemoryRateLimiter,
};
use marquee_model::MediaType;
use marquee_server::{AppState, Config, create_app};
use serde_json::{Value, json};

/// Canned TMDB responses. Id 404 is reported missing.
#[derive(Debug, Default)]
pub struct StubMetadata;

#[async_trait]
impl MetadataProvider for StubMetadata {
    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        page: Option<u32>,
    ) -> Result<Value, ProviderError> {
        Ok(json!({
            "query": query,
            "mediaType": media_type.map(|m| m.as_str()),
            "page": page.unwrap_or(1),
            "results": [{ "id": 603, "title": "The Matrix" }],
        }))
    }

    async fn details(&self, media_type: MediaType, id: i64) -> Result<Value, ProviderError> {
        if id == 404 {
            return Err(ProviderError::NotFound);
        }
        Ok(json!({ "id": id, "mediaType": media_type.as_str() }))
    }

    async fn recommendations(
        &self,
        _media_type: MediaType,
        id: i64,
        _page: Option<u32>,
    ) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id, "results": [] }))
    }

    async fn season(&self, tv_id: i64, season_number: i32) -> Result<Value, ProviderError> {
        Ok(json!({ "id": tv_id, "season_number": season_number, "episodes": [] }))
    }

    async fn trending(
        &self,
        _media_type: Option<MediaType>,
        window: TrendingWindow,
    ) -> Result<Value, ProviderError> {
        Ok(json!({ "window": window.as_str(), "results": [] }))
    }
}

/// Echoes the last user turn back.
#[derive(Debug, Default)]
pub struct EchoChat;

#[async_trait]
impl ChatBackend for EchoChat {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ChatReply {
            message: ChatMessage {
                role: ChatRole::Assistant,
                content: format!("echo: {last}"),
            },
            model: "echo".into(),
        })
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub fn test_config() -> Config {
    let mut config = Config::development();
    config.auth.password_pepper = "test-pepper".into();
    config.auth.token_key = "test-token-key-with-enough-length".into();
    config
}

pub fn build_state(config: Config) -> Result<AppState> {
    let crypto = AuthCrypto::fast(config.auth.password_pepper.as_bytes())
        .map_err(|err| anyhow!("failed to build auth crypto: {err}"))?;
    Ok(AppState::new(
        config,
        AppUnitOfWork::in_memory(),
        crypto,
        Arc::new(InMemoryRateLimiter::new()),
    ))
}

pub fn serve(state: AppState) -> Result<TestApp> {
    let make_service =
        create_app(state.clone()).into_make_service_with_connect_info::<SocketAddr>();
    let server = TestServer::builder()
        .http_transport()
        .build(make_service)
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok(TestApp { server, state })
}

/// In-memory app without upstream providers.
pub fn build_test_app() -> Result<TestApp> {
    serve(build_state(test_config())?)
}

/// In-memory app with stubbed TMDB and chat upstreams.
pub fn build_test_app_with_upstreams() -> Result<TestApp> {
    let state = build_state(test_config())?
        .with_metadata(Arc::new(StubMetadata))
        .with_chat(Arc::new(EchoChat));
    serve(state)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Sign up and return `(user_id, token)`.
pub async fn signup(server: &TestServer, email: &str) -> Result<(String, String)> {
    let response = server
        .post("/api/auth/signup")
        .json(&json!({ "email": email, "password": "correct horse battery" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    let user_id = body["data"]["user"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("missing user id"))?
        .to_string();
    let token = body["data"]["token"]
        .as_str()
        .ok_or_else(|| anyhow!("missing token"))?
        .to_string();
    Ok((user_id, token))
}
