use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidMediaType(String),
    InvalidRole(String),
    InvalidProvider(String),
    InvalidEpisodeKey(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidMediaType(raw) => {
                write!(f, "invalid media type: {raw}")
            }
            ModelError::InvalidRole(raw) => write!(f, "invalid role: {raw}"),
            ModelError::InvalidProvider(raw) => {
                write!(f, "invalid auth provider: {raw}")
            }
            ModelError::InvalidEpisodeKey(msg) => {
                write!(f, "invalid episode key: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
