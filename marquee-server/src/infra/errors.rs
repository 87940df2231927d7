use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use marquee_core::MarqueeError;
use marquee_core::auth::AuthCryptoError;
use marquee_core::providers::ProviderError;
use marquee_model::ModelError;

pub type AppResult<T> = Result<T, AppError>;

/// Standard JSON envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(error),
            message: None,
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(self.message));
        (self.status, body).into_response()
    }
}

impl From<MarqueeError> for AppError {
    fn from(err: MarqueeError) -> Self {
        match err {
            MarqueeError::Unauthorized(msg) => Self::unauthorized(msg),
            MarqueeError::Forbidden(msg) => Self::forbidden(msg),
            MarqueeError::NotFound(msg) => Self::not_found(msg),
            MarqueeError::Validation(msg) => Self::bad_request(msg),
            MarqueeError::Conflict(msg) => Self::conflict(msg),
            MarqueeError::Upstream(err) => err.into(),
            MarqueeError::Persistence(msg) => {
                tracing::error!(error = %msg, "persistence failure");
                Self::internal("Database operation failed")
            }
            MarqueeError::Serialization(err) => {
                tracing::error!(error = %err, "serialization failure");
                Self::internal("Internal server error")
            }
            MarqueeError::Internal(msg) => {
                tracing::error!(error = %msg, "internal failure");
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited => {
                Self::rate_limited("Upstream rate limit reached, try again shortly")
            }
            ProviderError::NotFound => Self::not_found("Not found upstream"),
            ProviderError::NotConfigured(what) => {
                Self::unavailable(format!("{what} is not configured"))
            }
            other => {
                tracing::warn!(error = %other, "upstream request failed");
                Self::unavailable("Upstream service unavailable")
            }
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        MarqueeError::from(err).into()
    }
}

impl From<AuthCryptoError> for AppError {
    fn from(err: AuthCryptoError) -> Self {
        tracing::error!(error = %err, "password hashing failed");
        Self::internal("Internal server error")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "unhandled failure");
        Self::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (MarqueeError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (MarqueeError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (MarqueeError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MarqueeError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (MarqueeError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                MarqueeError::Upstream(ProviderError::RateLimited),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                MarqueeError::Upstream(ProviderError::ApiError("boom".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MarqueeError::Persistence("pool timed out".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn persistence_messages_are_sanitized() {
        let err = AppError::from(MarqueeError::Persistence(
            "relation \"users\" does not exist".into(),
        ));
        assert_eq!(err.message, "Database operation failed");
    }
}
