//! Telemetry metadata resolution
//!
//! Extracts analytics attributes from the loosely typed request headers.
//! Every optional attribute is looked up through an ordered chain of
//! candidate keys (short wire code, readable alias, legacy alias); the first
//! non-empty value wins. The chains live in [`FIELD_RULES`] so adding an
//! alias is a one-line change.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TelemetryError;

/// Opt-in header; telemetry is resolved only when it equals [`ENABLE_ANALYTICS_TOKEN`]
pub const ENABLE_ANALYTICS_KEY: &str = "enableMuxAnalytics";

pub const ENABLE_ANALYTICS_TOKEN: &str = "true";

/// Header carrying the required environment key
pub const ENVIRONMENT_KEY: &str = "muxEnvKey";

/// Title reported when no title key is present
pub const DEFAULT_VIDEO_TITLE: &str = "STAGE-ANDROID";

/// Number of custom dimensions
pub const CUSTOM_FIELD_COUNT: usize = 5;

/// Optional telemetry attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    VideoTitle,
    VideoId,
    VideoDuration,
    ContentType,
    StreamType,
    VideoSeries,
    SessionId,
    ClientAppVersion,
    /// Custom dimension 1..=5
    Custom(u8),
}

/// What to do when no candidate key yields a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Omit,
    Default(&'static str),
    /// Synthesize a view session id from the clock
    GenerateSessionId,
}

/// Resolution rule for one attribute
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    /// Candidate keys in precedence order
    pub keys: &'static [&'static str],
    pub fallback: Fallback,
}

const fn rule(field: Field, keys: &'static [&'static str], fallback: Fallback) -> FieldRule {
    FieldRule {
        field,
        keys,
        fallback,
    }
}

pub const FIELD_RULES: &[FieldRule] = &[
    rule(
        Field::VideoTitle,
        &["vtt", "videoTitle", "cvd_video_title"],
        Fallback::Default(DEFAULT_VIDEO_TITLE),
    ),
    rule(Field::VideoId, &["vid", "videoId", "cvd_video_id"], Fallback::Omit),
    rule(
        Field::VideoDuration,
        &["vdu", "videoDuration", "cvd_video_duration"],
        Fallback::Omit,
    ),
    rule(
        Field::ContentType,
        &["vctty", "videoContentType", "cvd_video_content_type"],
        Fallback::Omit,
    ),
    rule(
        Field::StreamType,
        &["vsmty", "videoStreamType", "cvd_video_stream_type"],
        Fallback::Omit,
    ),
    rule(
        Field::VideoSeries,
        &["vsr", "videoSeries", "cvd_video_series"],
        Fallback::Omit,
    ),
    rule(
        Field::SessionId,
        &["xseid", "viewSessionId", "sessionID"],
        Fallback::GenerateSessionId,
    ),
    rule(
        Field::ClientAppVersion,
        &["xcialve", "clientApplicationVersion", "cvd_client_app_version"],
        Fallback::Omit,
    ),
    rule(Field::Custom(1), &["c1", "customData1", "cd_1"], Fallback::Omit),
    rule(Field::Custom(2), &["c2", "customData2", "cd_2"], Fallback::Omit),
    rule(Field::Custom(3), &["c3", "customData3", "cd_3"], Fallback::Omit),
    rule(Field::Custom(4), &["c4", "customData4", "cd_4"], Fallback::Omit),
    rule(Field::Custom(5), &["c5", "customData5", "cd_5"], Fallback::Omit),
];

/// Immutable analytics snapshot taken at session construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMetadata {
    pub environment_key: String,
    pub video_source_url: String,
    pub video_title: String,
    pub video_id: Option<String>,
    pub video_duration_millis: Option<u64>,
    pub content_type: Option<String>,
    pub stream_type: Option<String>,
    pub video_series: Option<String>,
    pub session_id: String,
    pub client_app_version: Option<String>,
    pub custom_fields: [Option<String>; CUSTOM_FIELD_COUNT],
}

impl TelemetryMetadata {
    /// Custom dimension by 1-based index
    pub fn custom_field(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.custom_fields.get(i))
            .and_then(|v| v.as_deref())
    }
}

/// Whether the headers opt into telemetry
pub fn is_enabled(headers: &HashMap<String, String>) -> bool {
    headers.get(ENABLE_ANALYTICS_KEY).map(String::as_str) == Some(ENABLE_ANALYTICS_TOKEN)
}

/// First non-empty value among the candidate keys
pub fn lookup<'a>(headers: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| headers.get(*key))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

/// Resolve telemetry metadata using the current time.
///
/// `Ok(None)` is the normal disabled path.
pub fn resolve(
    headers: &HashMap<String, String>,
    locator: &str,
) -> Result<Option<TelemetryMetadata>, TelemetryError> {
    resolve_at(headers, locator, Utc::now())
}

/// Resolve telemetry metadata with an explicit clock for generated values
pub fn resolve_at(
    headers: &HashMap<String, String>,
    locator: &str,
    now: DateTime<Utc>,
) -> Result<Option<TelemetryMetadata>, TelemetryError> {
    if !is_enabled(headers) {
        debug!("Telemetry not requested");
        return Ok(None);
    }

    let environment_key = headers
        .get(ENVIRONMENT_KEY)
        .filter(|key| !key.trim().is_empty())
        .ok_or(TelemetryError::MissingEnvironmentKey)?
        .clone();

    let mut values: BTreeMap<Field, String> = BTreeMap::new();
    for rule in FIELD_RULES {
        let value = match (lookup(headers, rule.keys), rule.fallback) {
            (Some(found), _) => Some(found.to_string()),
            (None, Fallback::Omit) => None,
            (None, Fallback::Default(default)) => Some(default.to_string()),
            (None, Fallback::GenerateSessionId) => Some(generate_session_id(now)),
        };
        if let Some(value) = value {
            values.insert(rule.field, value);
        }
    }

    let video_duration_millis = match values.remove(&Field::VideoDuration) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(millis) => Some(millis),
            Err(_) => {
                let err = TelemetryError::InvalidNumber {
                    key: "video duration",
                    value: raw,
                };
                warn!(error = %err, "Ignoring telemetry field");
                None
            }
        },
        None => None,
    };

    let mut custom_fields: [Option<String>; CUSTOM_FIELD_COUNT] = Default::default();
    for (i, slot) in custom_fields.iter_mut().enumerate() {
        *slot = values.remove(&Field::Custom(i as u8 + 1));
    }

    Ok(Some(TelemetryMetadata {
        environment_key,
        video_source_url: locator.to_string(),
        video_title: values
            .remove(&Field::VideoTitle)
            .unwrap_or_else(|| DEFAULT_VIDEO_TITLE.to_string()),
        video_id: values.remove(&Field::VideoId),
        video_duration_millis,
        content_type: values.remove(&Field::ContentType),
        stream_type: values.remove(&Field::StreamType),
        video_series: values.remove(&Field::VideoSeries),
        session_id: values
            .remove(&Field::SessionId)
            .unwrap_or_else(|| generate_session_id(now)),
        client_app_version: values.remove(&Field::ClientAppVersion),
        custom_fields,
    }))
}

fn generate_session_id(now: DateTime<Utc>) -> String {
    format!("session-{}", now.timestamp_millis())
}
