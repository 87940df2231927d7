//! Upstream HTTP clients.

pub mod chat;
pub mod tmdb;

use reqwest::StatusCode;

pub use chat::{ChatBackend, ChatMessage, ChatReply, ChatRequest, ChatRole, OpenAiChatClient};
pub use tmdb::{MetadataProvider, TmdbProvider, TrendingWindow};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProviderError {
    /// Classify a non-success upstream status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => ProviderError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::InvalidApiKey
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            other => {
                let snippet: String = body.chars().take(200).collect();
                ProviderError::ApiError(format!("{other}: {snippet}"))
            }
        }
    }
}
