//! Video source identifiers.
//!
//! Sources are stored and exchanged by canonical name (`videasy`,
//! `vidlink`, ...). Older clients and older rows carry a numeric legacy id
//! instead; both spellings are accepted on input and normalized here.
//!
//! | id  | name    | status |
//! |-----|---------|--------|
//! | `1` | videasy | active |
//! | `2` | vidlink | active |
//! | `3` | vidnest | active |
//! | `4` | vidsrc  | legacy |
//! | `5` | vidrock | legacy |

pub mod embed;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use embed::{EmbedParams, EmbedProvider, ProviderCapabilities};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized video source: {0:?}")]
pub struct UnrecognizedSource(pub String);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum VideoSource {
    Videasy,
    Vidlink,
    Vidnest,
    Vidsrc,
    Vidrock,
}

impl VideoSource {
    pub const ALL: [VideoSource; 5] = [
        VideoSource::Videasy,
        VideoSource::Vidlink,
        VideoSource::Vidnest,
        VideoSource::Vidsrc,
        VideoSource::Vidrock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VideoSource::Videasy => "videasy",
            VideoSource::Vidlink => "vidlink",
            VideoSource::Vidnest => "vidnest",
            VideoSource::Vidsrc => "vidsrc",
            VideoSource::Vidrock => "vidrock",
        }
    }

    pub fn legacy_id(&self) -> &'static str {
        match self {
            VideoSource::Videasy => "1",
            VideoSource::Vidlink => "2",
            VideoSource::Vidnest => "3",
            VideoSource::Vidsrc => "4",
            VideoSource::Vidrock => "5",
        }
    }

    /// Retired providers still resolvable for old rows but not offered to
    /// new sessions.
    pub fn is_legacy(&self) -> bool {
        matches!(self, VideoSource::Vidsrc | VideoSource::Vidrock)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(name))
    }

    pub fn from_legacy_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL.into_iter().find(|source| source.legacy_id() == id)
    }

    /// Sources offered to new sessions.
    pub fn active() -> impl Iterator<Item = VideoSource> {
        Self::ALL.into_iter().filter(|source| !source.is_legacy())
    }
}

impl Display for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoSource {
    type Err = UnrecognizedSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
            .or_else(|| Self::from_legacy_id(s))
            .ok_or_else(|| UnrecognizedSource(s.to_string()))
    }
}

impl TryFrom<String> for VideoSource {
    type Error = UnrecognizedSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Map a canonical name to its legacy numeric id. Known numeric ids pass
/// through unchanged.
pub fn name_to_id(input: &str) -> Result<&'static str, UnrecognizedSource> {
    input.parse::<VideoSource>().map(|source| source.legacy_id())
}

/// Map a legacy numeric id to its canonical name. Canonical names pass
/// through unchanged.
pub fn id_to_name(input: &str) -> Result<&'static str, UnrecognizedSource> {
    input.parse::<VideoSource>().map(|source| source.name())
}

/// Normalize any accepted spelling to a [`VideoSource`].
pub fn normalize(input: &str) -> Result<VideoSource, UnrecognizedSource> {
    input.parse()
}
