//! Session request and player options

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Player options supplied by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPlayerOptions {
    /// Play alongside other audio instead of taking audio focus
    #[serde(default)]
    pub mix_with_others: bool,
}

/// Client request that constructs a playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Source locator
    pub uri: String,
    /// Explicit format token (`ss`, `dash`, `hls`, `other`)
    #[serde(default)]
    pub format_hint: Option<String>,
    /// Request headers; also carries the telemetry configuration
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
    #[serde(default)]
    pub options: VideoPlayerOptions,
}

impl SessionRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            format_hint: None,
            http_headers: HashMap::new(),
            options: VideoPlayerOptions::default(),
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: VideoPlayerOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a request from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a request from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json() {
        let request = SessionRequest::from_json_str(
            r#"{
                "uri": "https://cdn.example.com/live.m3u8",
                "formatHint": "hls",
                "httpHeaders": {"User-Agent": "Playbridge/1.0", "enableMuxAnalytics": "true"},
                "options": {"mixWithOthers": true}
            }"#,
        )
        .unwrap();

        assert_eq!(request.format_hint.as_deref(), Some("hls"));
        assert_eq!(request.http_headers.len(), 2);
        assert!(request.options.mix_with_others);
    }

    #[test]
    fn test_request_defaults() {
        let request = SessionRequest::from_json_str(r#"{"uri": "clip.mp4"}"#).unwrap();
        assert_eq!(request, SessionRequest::new("clip.mp4"));
        assert!(!request.options.mix_with_others);
    }

    #[test]
    fn test_request_builder() {
        let request = SessionRequest::new("a.mpd")
            .with_format_hint("dash")
            .with_header("muxEnvKey", "env")
            .with_options(VideoPlayerOptions {
                mix_with_others: true,
            });
        assert_eq!(request.format_hint.as_deref(), Some("dash"));
        assert_eq!(request.http_headers.get("muxEnvKey").map(String::as_str), Some("env"));
        assert!(request.options.mix_with_others);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            SessionRequest::from_json_str("{"),
            Err(crate::Error::Json(_))
        ));
    }
}
