use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Kind of title a record refers to.
///
/// The wire and storage form is the lowercase name used by the metadata
/// provider (`movie`, `tv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    /// Episodic media carries season/episode coordinates.
    pub fn is_episodic(&self) -> bool {
        matches!(self, MediaType::Tv)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv" | "series" | "show" => Ok(MediaType::Tv),
            other => Err(ModelError::InvalidMediaType(other.to_string())),
        }
    }
}
