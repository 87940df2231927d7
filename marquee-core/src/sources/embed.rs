//! Embed URL construction.
//!
//! Each [`VideoSource`] has one [`EmbedProvider`] that knows the host's URL
//! layout and which player options it understands. Options a provider does
//! not declare in its [`ProviderCapabilities`] are dropped silently.

use marquee_model::{MediaType, is_valid_episode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::VideoSource;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("media id must be positive, got {0}")]
    InvalidMediaId(i64),

    #[error("season must be 0 or more and episode 1 or more")]
    InvalidEpisode,

    #[error("invalid hex color: {0}")]
    InvalidColor(String),

    #[error("failed to build embed url: {0}")]
    Url(#[from] url::ParseError),
}

/// Static description of what a provider's player supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    /// Player posts progress messages to the parent frame.
    pub supports_progress_events: bool,
    pub supports_subtitles: bool,
    pub supports_autoplay: bool,
    pub supports_color: bool,
    pub supports_start_time: bool,
    pub supports_next_episode: bool,
    pub supports_episode_selector: bool,
    pub legacy: bool,
}

/// Player request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedParams {
    #[serde(skip)]
    pub media_type: Option<MediaType>,
    #[serde(skip)]
    pub media_id: i64,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub autoplay: Option<bool>,
    /// Accent color as hex, with or without a leading `#`.
    pub color: Option<String>,
    /// Resume offset in whole seconds.
    pub start_at: Option<u64>,
    pub next_episode: Option<bool>,
    pub episode_selector: Option<bool>,
}

impl EmbedParams {
    pub fn movie(media_id: i64) -> Self {
        Self {
            media_type: Some(MediaType::Movie),
            media_id,
            ..Default::default()
        }
    }

    pub fn episode(media_id: i64, season: i32, episode: i32) -> Self {
        Self {
            media_type: Some(MediaType::Tv),
            media_id,
            season: Some(season),
            episode: Some(episode),
            ..Default::default()
        }
    }
}

pub trait EmbedProvider: Send + Sync {
    fn source(&self) -> VideoSource;

    fn capabilities(&self) -> &'static ProviderCapabilities;

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError>;
}

/// Path segment shared by every host: `movie/{id}` or `tv/{id}/{s}/{e}`.
fn media_path(params: &EmbedParams) -> Result<String, EmbedError> {
    if params.media_id <= 0 {
        return Err(EmbedError::InvalidMediaId(params.media_id));
    }

    match params.media_type.unwrap_or(MediaType::Movie) {
        MediaType::Movie => Ok(format!("movie/{}", params.media_id)),
        MediaType::Tv => {
            let season = params.season.unwrap_or(1);
            let episode = params.episode.unwrap_or(1);
            if !is_valid_episode(season, episode) {
                return Err(EmbedError::InvalidEpisode);
            }
            Ok(format!("tv/{}/{}/{}", params.media_id, season, episode))
        }
    }
}

fn normalize_color(raw: &str) -> Result<String, EmbedError> {
    let hex = raw.trim().trim_start_matches('#');
    let valid = matches!(hex.len(), 3 | 6)
        && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(EmbedError::InvalidColor(raw.to_string()));
    }
    Ok(hex.to_ascii_lowercase())
}

fn assemble(
    base: &str,
    params: &EmbedParams,
    query: Vec<(&'static str, String)>,
) -> Result<Url, EmbedError> {
    let mut url = Url::parse(&format!("{base}/{}", media_path(params)?))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

fn flag(value: bool) -> String {
    value.to_string()
}

fn is_tv(params: &EmbedParams) -> bool {
    params.media_type.is_some_and(|t| t.is_episodic())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Videasy;

#[derive(Debug, Clone, Copy, Default)]
pub struct Vidlink;

#[derive(Debug, Clone, Copy, Default)]
pub struct Vidnest;

#[derive(Debug, Clone, Copy, Default)]
pub struct Vidsrc;

#[derive(Debug, Clone, Copy, Default)]
pub struct Vidrock;

static VIDEASY_CAPS: ProviderCapabilities = ProviderCapabilities {
    supports_progress_events: true,
    supports_subtitles: true,
    supports_autoplay: true,
    supports_color: true,
    supports_start_time: true,
    supports_next_episode: true,
    supports_episode_selector: true,
    legacy: false,
};

static VIDLINK_CAPS: ProviderCapabilities = ProviderCapabilities {
    supports_progress_events: true,
    supports_subtitles: true,
    supports_autoplay: true,
    supports_color: true,
    supports_start_time: true,
    supports_next_episode: true,
    supports_episode_selector: false,
    legacy: false,
};

static VIDNEST_CAPS: ProviderCapabilities = ProviderCapabilities {
    supports_progress_events: false,
    supports_subtitles: true,
    supports_autoplay: true,
    supports_color: false,
    supports_start_time: false,
    supports_next_episode: false,
    supports_episode_selector: false,
    legacy: false,
};

static VIDSRC_CAPS: ProviderCapabilities = ProviderCapabilities {
    supports_progress_events: false,
    supports_subtitles: true,
    supports_autoplay: true,
    supports_color: false,
    supports_start_time: false,
    supports_next_episode: false,
    supports_episode_selector: false,
    legacy: true,
};

static VIDROCK_CAPS: ProviderCapabilities = ProviderCapabilities {
    supports_progress_events: false,
    supports_subtitles: false,
    supports_autoplay: true,
    supports_color: false,
    supports_start_time: false,
    supports_next_episode: false,
    supports_episode_selector: false,
    legacy: true,
};

impl EmbedProvider for Videasy {
    fn source(&self) -> VideoSource {
        VideoSource::Videasy
    }

    fn capabilities(&self) -> &'static ProviderCapabilities {
        &VIDEASY_CAPS
    }

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError> {
        let mut query = Vec::new();
        if let Some(color) = &params.color {
            query.push(("color", normalize_color(color)?));
        }
        if let Some(start) = params.start_at.filter(|s| *s > 0) {
            query.push(("progress", start.to_string()));
        }
        if is_tv(params) {
            if let Some(next) = params.next_episode {
                query.push(("nextEpisode", flag(next)));
            }
            if let Some(autoplay) = params.autoplay {
                query.push(("autoplayNextEpisode", flag(autoplay)));
            }
            if let Some(selector) = params.episode_selector {
                query.push(("episodeSelector", flag(selector)));
            }
        }
        assemble("https://player.videasy.net", params, query)
    }
}

impl EmbedProvider for Vidlink {
    fn source(&self) -> VideoSource {
        VideoSource::Vidlink
    }

    fn capabilities(&self) -> &'static ProviderCapabilities {
        &VIDLINK_CAPS
    }

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError> {
        let mut query = Vec::new();
        if let Some(color) = &params.color {
            query.push(("primaryColor", normalize_color(color)?));
        }
        if let Some(autoplay) = params.autoplay {
            query.push(("autoplay", flag(autoplay)));
        }
        if let Some(start) = params.start_at.filter(|s| *s > 0) {
            query.push(("startAt", start.to_string()));
        }
        if is_tv(params)
            && let Some(next) = params.next_episode
        {
            query.push(("nextbutton", flag(next)));
        }
        assemble("https://vidlink.pro", params, query)
    }
}

impl EmbedProvider for Vidnest {
    fn source(&self) -> VideoSource {
        VideoSource::Vidnest
    }

    fn capabilities(&self) -> &'static ProviderCapabilities {
        &VIDNEST_CAPS
    }

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError> {
        let query = params
            .autoplay
            .map(|autoplay| vec![("autoplay", flag(autoplay))])
            .unwrap_or_default();
        assemble("https://vidnest.fun", params, query)
    }
}

impl EmbedProvider for Vidsrc {
    fn source(&self) -> VideoSource {
        VideoSource::Vidsrc
    }

    fn capabilities(&self) -> &'static ProviderCapabilities {
        &VIDSRC_CAPS
    }

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError> {
        let query = params
            .autoplay
            .map(|autoplay| vec![("autoPlay", flag(autoplay))])
            .unwrap_or_default();
        assemble("https://vidsrc.cc/v2/embed", params, query)
    }
}

impl EmbedProvider for Vidrock {
    fn source(&self) -> VideoSource {
        VideoSource::Vidrock
    }

    fn capabilities(&self) -> &'static ProviderCapabilities {
        &VIDROCK_CAPS
    }

    fn build_embed_url(&self, params: &EmbedParams) -> Result<Url, EmbedError> {
        let query = params
            .autoplay
            .map(|autoplay| vec![("autoplay", flag(autoplay))])
            .unwrap_or_default();
        assemble("https://vidrock.net", params, query)
    }
}

impl VideoSource {
    pub fn provider(&self) -> &'static dyn EmbedProvider {
        match self {
            VideoSource::Videasy => &Videasy,
            VideoSource::Vidlink => &Vidlink,
            VideoSource::Vidnest => &Vidnest,
            VideoSource::Vidsrc => &Vidsrc,
            VideoSource::Vidrock => &Vidrock,
        }
    }

    pub fn capabilities(&self) -> &'static ProviderCapabilities {
        self.provider().capabilities()
    }
}
