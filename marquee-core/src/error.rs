use marquee_model::ModelError;
use thiserror::Error;

use crate::providers::ProviderError;
use crate::sources::UnrecognizedSource;
use crate::sources::embed::EmbedError;

#[derive(Error, Debug)]
pub enum MarqueeError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ModelError> for MarqueeError {
    fn from(err: ModelError) -> Self {
        MarqueeError::Validation(err.to_string())
    }
}

impl From<UnrecognizedSource> for MarqueeError {
    fn from(err: UnrecognizedSource) -> Self {
        MarqueeError::Validation(err.to_string())
    }
}

impl From<EmbedError> for MarqueeError {
    fn from(err: EmbedError) -> Self {
        MarqueeError::Validation(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for MarqueeError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                MarqueeError::NotFound("record not found".into())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MarqueeError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                MarqueeError::NotFound(db.message().to_string())
            }
            _ => MarqueeError::Persistence(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarqueeError>;
