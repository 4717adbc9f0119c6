//! Media source format resolution
//!
//! Maps a source locator plus an optional explicit hint to one of four
//! formats and to the strategy used to build a media source for it. Pure:
//! no I/O happens here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Header carrying the engine's user agent
pub const USER_AGENT_HEADER: &str = "User-Agent";

/// User agent used when the request does not supply one
pub const DEFAULT_USER_AGENT: &str = "ExoPlayer";

/// Container/streaming formats understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    SmoothStreaming,
    Dash,
    Hls,
    Progressive,
}

impl SourceFormat {
    /// Parse an explicit format hint (case-sensitive)
    pub fn from_hint(hint: &str) -> Result<Self> {
        match hint {
            "ss" => Ok(SourceFormat::SmoothStreaming),
            "dash" => Ok(SourceFormat::Dash),
            "hls" => Ok(SourceFormat::Hls),
            "other" => Ok(SourceFormat::Progressive),
            _ => Err(Error::UnsupportedFormat {
                hint: hint.to_string(),
            }),
        }
    }

    /// Hint token for this format
    pub fn token(&self) -> &'static str {
        match self {
            SourceFormat::SmoothStreaming => "ss",
            SourceFormat::Dash => "dash",
            SourceFormat::Hls => "hls",
            SourceFormat::Progressive => "other",
        }
    }

    /// Strategy used to build a media source of this format
    pub fn strategy(&self) -> SourceStrategy {
        match self {
            SourceFormat::SmoothStreaming | SourceFormat::Dash => SourceStrategy::ChunkedManifest,
            SourceFormat::Hls => SourceStrategy::Playlist,
            SourceFormat::Progressive => SourceStrategy::Progressive,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::SmoothStreaming => write!(f, "SmoothStreaming"),
            SourceFormat::Dash => write!(f, "DASH"),
            SourceFormat::Hls => write!(f, "HLS"),
            SourceFormat::Progressive => write!(f, "Progressive"),
        }
    }
}

/// How the engine-specific builder constructs the media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    /// Manifest fetched through its own data source, media through a default chunk source
    ChunkedManifest,
    /// Playlist-driven segment loading
    Playlist,
    /// Single progressively downloaded resource
    Progressive,
}

/// Resolve the format for a locator, honoring an explicit hint first
pub fn resolve_format(locator: &str, hint: Option<&str>) -> Result<SourceFormat> {
    match hint {
        Some(hint) => SourceFormat::from_hint(hint),
        None => infer_format(locator),
    }
}

/// Infer the format from the locator's path conventions
pub fn infer_format(locator: &str) -> Result<SourceFormat> {
    let unresolvable = || Error::UnresolvableSource {
        locator: locator.to_string(),
    };

    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(unresolvable());
    }

    let path = match Url::parse(trimmed) {
        Ok(url) => url.path().to_string(),
        // Plain file paths and relative locators
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let path = path.to_lowercase();
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    if last_segment.is_empty() {
        return Err(unresolvable());
    }

    if path.ends_with(".mpd") {
        return Ok(SourceFormat::Dash);
    }
    if path.ends_with(".m3u8") {
        return Ok(SourceFormat::Hls);
    }
    if is_smooth_streaming_path(&path) {
        return Ok(SourceFormat::SmoothStreaming);
    }

    Ok(SourceFormat::Progressive)
}

/// `.ism`/`.isml`, optionally followed by `/manifest...`
fn is_smooth_streaming_path(path: &str) -> bool {
    let Some(idx) = path.rfind(".ism") else {
        return false;
    };
    let rest = &path[idx + ".ism".len()..];
    let rest = rest.strip_prefix('l').unwrap_or(rest);
    rest.is_empty() || rest == "/" || rest.starts_with("/manifest")
}

/// HTTP data source settings handed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub user_agent: String,
    pub allow_cross_protocol_redirects: bool,
    /// Default request properties sent with every request
    pub request_headers: HashMap<String, String>,
}

impl DataSourceConfig {
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let user_agent = headers
            .get(USER_AGENT_HEADER)
            .filter(|ua| !ua.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Self {
            user_agent,
            allow_cross_protocol_redirects: true,
            request_headers: headers.clone(),
        }
    }
}

/// Media source description consumed by
/// [`MediaEngine::set_media_source`](crate::engine::MediaEngine::set_media_source)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub format: SourceFormat,
    pub strategy: SourceStrategy,
    pub uri: String,
    pub data_source: DataSourceConfig,
}

impl MediaSource {
    /// Resolve the format and describe the media source for it
    pub fn build(
        locator: &str,
        hint: Option<&str>,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let format = resolve_format(locator, hint)?;
        Ok(Self {
            format,
            strategy: format.strategy(),
            uri: locator.to_string(),
            data_source: DataSourceConfig::from_headers(headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_tokens() {
        assert_eq!(SourceFormat::from_hint("ss").unwrap(), SourceFormat::SmoothStreaming);
        assert_eq!(SourceFormat::from_hint("dash").unwrap(), SourceFormat::Dash);
        assert_eq!(SourceFormat::from_hint("hls").unwrap(), SourceFormat::Hls);
        assert_eq!(SourceFormat::from_hint("other").unwrap(), SourceFormat::Progressive);
    }

    #[test]
    fn test_hint_is_case_sensitive() {
        assert!(matches!(
            SourceFormat::from_hint("HLS"),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            SourceFormat::from_hint("mp4"),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_hint_overrides_inference() {
        let format = resolve_format("https://example.com/master.m3u8", Some("dash")).unwrap();
        assert_eq!(format, SourceFormat::Dash);
    }

    #[test]
    fn test_detect_hls() {
        assert_eq!(infer_format("https://example.com/master.m3u8").unwrap(), SourceFormat::Hls);
        assert_eq!(
            infer_format("https://example.com/Live/INDEX.M3U8?token=1").unwrap(),
            SourceFormat::Hls
        );
    }

    #[test]
    fn test_detect_dash() {
        assert_eq!(infer_format("https://example.com/manifest.mpd").unwrap(), SourceFormat::Dash);
    }

    #[test]
    fn test_detect_smooth_streaming() {
        for locator in [
            "https://example.com/video.ism",
            "https://example.com/video.isml",
            "https://example.com/video.ism/Manifest",
            "https://example.com/video.ism/manifest(format=m3u8-aapl)",
        ] {
            assert_eq!(
                infer_format(locator).unwrap(),
                SourceFormat::SmoothStreaming,
                "{locator}"
            );
        }
    }

    #[test]
    fn test_detect_progressive() {
        assert_eq!(
            infer_format("https://example.com/clip.mp4").unwrap(),
            SourceFormat::Progressive
        );
        assert_eq!(
            infer_format("file:///sdcard/movie.mkv").unwrap(),
            SourceFormat::Progressive
        );
        assert_eq!(
            infer_format("videos/local.webm").unwrap(),
            SourceFormat::Progressive
        );
    }

    #[test]
    fn test_unresolvable_locators() {
        assert!(matches!(infer_format(""), Err(Error::UnresolvableSource { .. })));
        assert!(matches!(infer_format("   "), Err(Error::UnresolvableSource { .. })));
        assert!(matches!(
            infer_format("https://example.com/"),
            Err(Error::UnresolvableSource { .. })
        ));
    }

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(SourceFormat::SmoothStreaming.strategy(), SourceStrategy::ChunkedManifest);
        assert_eq!(SourceFormat::Dash.strategy(), SourceStrategy::ChunkedManifest);
        assert_eq!(SourceFormat::Hls.strategy(), SourceStrategy::Playlist);
        assert_eq!(SourceFormat::Progressive.strategy(), SourceStrategy::Progressive);
    }

    #[test]
    fn test_data_source_user_agent() {
        let mut headers = HashMap::new();
        assert_eq!(DataSourceConfig::from_headers(&headers).user_agent, "ExoPlayer");

        headers.insert("User-Agent".to_string(), "MyApp/2.0".to_string());
        let config = DataSourceConfig::from_headers(&headers);
        assert_eq!(config.user_agent, "MyApp/2.0");
        assert!(config.allow_cross_protocol_redirects);
        assert_eq!(config.request_headers.len(), 1);
    }

    #[test]
    fn test_build_media_source() {
        let source =
            MediaSource::build("https://example.com/a.mpd", None, &HashMap::new()).unwrap();
        assert_eq!(source.format, SourceFormat::Dash);
        assert_eq!(source.strategy, SourceStrategy::ChunkedManifest);
        assert_eq!(source.uri, "https://example.com/a.mpd");

        assert!(MediaSource::build("https://example.com/a.mp4", Some("mp4"), &HashMap::new())
            .is_err());
    }
}
