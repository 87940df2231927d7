//! TMDB metadata pass-through.
//!
//! Responses are returned as raw JSON; the front end consumes TMDB's shapes
//! directly, so nothing here models them.

use std::time::Duration;

use async_trait::async_trait;
use marquee_model::MediaType;
use serde_json::Value;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::ProviderError;

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    W92,
    W154,
    W185,
    W342,
    W500,
    W780,
    Original,
}

impl PosterSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosterSize::W92 => "w92",
            PosterSize::W154 => "w154",
            PosterSize::W185 => "w185",
            PosterSize::W342 => "w342",
            PosterSize::W500 => "w500",
            PosterSize::W780 => "w780",
            PosterSize::Original => "original",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackdropSize {
    W300,
    W780,
    W1280,
    Original,
}

impl BackdropSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackdropSize::W300 => "w300",
            BackdropSize::W780 => "w780",
            BackdropSize::W1280 => "w1280",
            BackdropSize::Original => "original",
        }
    }
}

/// Absolute URL of a TMDB image path such as `/abc.jpg`.
pub fn poster_url(path: &str, size: PosterSize) -> String {
    format!("{TMDB_IMAGE_BASE}/{}/{}", size.as_str(), path.trim_start_matches('/'))
}

pub fn backdrop_url(path: &str, size: BackdropSize) -> String {
    format!("{TMDB_IMAGE_BASE}/{}/{}", size.as_str(), path.trim_start_matches('/'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingWindow {
    Day,
    #[default]
    Week,
}

impl TrendingWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search movies, shows, or both when `media_type` is `None`.
    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        page: Option<u32>,
    ) -> Result<Value, ProviderError>;

    async fn details(
        &self,
        media_type: MediaType,
        id: i64,
    ) -> Result<Value, ProviderError>;

    async fn recommendations(
        &self,
        media_type: MediaType,
        id: i64,
        page: Option<u32>,
    ) -> Result<Value, ProviderError>;

    async fn season(
        &self,
        tv_id: i64,
        season_number: i32,
    ) -> Result<Value, ProviderError>;

    async fn trending(
        &self,
        media_type: Option<MediaType>,
        window: TrendingWindow,
    ) -> Result<Value, ProviderError>;
}

pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: Zeroizing<String>,
    base_url: Url,
}

impl std::fmt::Debug for TmdbProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbProvider")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TmdbProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let raw = base_url.unwrap_or(DEFAULT_TMDB_BASE_URL);
        // A trailing slash keeps `Url::join` from dropping the `/3` segment.
        let base_url = Url::parse(&format!("{}/", raw.trim_end_matches('/')))
            .map_err(|e| ProviderError::ParseError(format!("invalid TMDB base url: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: Zeroizing::new(api_key.into()),
            base_url,
        })
    }

    /// Build the request URL for `path` with the API key and `query`
    /// appended.
    pub fn endpoint(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &self.api_key);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let url = self.endpoint(path, query)?;
        debug!(path, "TMDB request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

fn page_param(page: Option<u32>) -> Vec<(&'static str, String)> {
    page.map(|p| vec![("page", p.max(1).to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        page: Option<u32>,
    ) -> Result<Value, ProviderError> {
        let path = match media_type {
            Some(kind) => format!("search/{}", kind.as_str()),
            None => "search/multi".to_string(),
        };
        let mut params = vec![
            ("query", query.to_string()),
            ("include_adult", "false".to_string()),
        ];
        params.extend(page_param(page));
        self.get_json(&path, &params).await
    }

    async fn details(
        &self,
        media_type: MediaType,
        id: i64,
    ) -> Result<Value, ProviderError> {
        let path = format!("{}/{id}", media_type.as_str());
        let params = [(
            "append_to_response",
            "credits,videos,external_ids".to_string(),
        )];
        self.get_json(&path, &params).await
    }

    async fn recommendations(
        &self,
        media_type: MediaType,
        id: i64,
        page: Option<u32>,
    ) -> Result<Value, ProviderError> {
        let path = format!("{}/{id}/recommendations", media_type.as_str());
        self.get_json(&path, &page_param(page)).await
    }

    async fn season(
        &self,
        tv_id: i64,
        season_number: i32,
    ) -> Result<Value, ProviderError> {
        let path = format!("tv/{tv_id}/season/{season_number}");
        self.get_json(&path, &[]).await
    }

    async fn trending(
        &self,
        media_type: Option<MediaType>,
        window: TrendingWindow,
    ) -> Result<Value, ProviderError> {
        let kind = media_type.map_or("all", |t| t.as_str());
        let path = format!("trending/{kind}/{}", window.as_str());
        self.get_json(&path, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_the_version_segment() {
        let provider = TmdbProvider::new("k3y", None).unwrap();
        let url = provider
            .endpoint("movie/550", &[("page", "2".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.themoviedb.org/3/movie/550?api_key=k3y&page=2"
        );
    }

    #[test]
    fn custom_base_urls_are_normalized() {
        let provider =
            TmdbProvider::new("k", Some("http://localhost:9000/tmdb/")).unwrap();
        let url = provider.endpoint("/trending/all/week", &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/tmdb/trending/all/week?api_key=k"
        );
    }

    #[test]
    fn image_urls() {
        assert_eq!(
            poster_url("/abc.jpg", PosterSize::W342),
            "https://image.tmdb.org/t/p/w342/abc.jpg"
        );
        assert_eq!(
            backdrop_url("xyz.png", BackdropSize::Original),
            "https://image.tmdb.org/t/p/original/xyz.png"
        );
    }

    #[test]
    fn debug_output_hides_the_key() {
        let provider = TmdbProvider::new("super-secret", None).unwrap();
        assert!(!format!("{provider:?}").contains("super-secret"));
    }
}
