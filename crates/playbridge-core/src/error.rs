//! Error types for Playbridge Core

use thiserror::Error;

use crate::session::PlaybackState;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session error types
#[derive(Error, Debug)]
pub enum Error {
    // Construction errors
    #[error("Unsupported format hint: {hint}")]
    UnsupportedFormat { hint: String },

    #[error("Cannot resolve a media format for source: {locator:?}")]
    UnresolvableSource { locator: String },

    // Lifecycle errors
    #[error("Session has been disposed")]
    Disposed,

    #[error("Operation not allowed in {state} state")]
    InvalidState { state: PlaybackState },

    // Engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error aborts session construction
    pub fn is_construction_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. } | Error::UnresolvableSource { .. }
        )
    }

    /// Returns the error code reported to clients
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Error::UnresolvableSource { .. } => "UNRESOLVABLE_SOURCE",
            Error::Disposed => "DISPOSED",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::Engine(_) => "ENGINE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

/// Telemetry resolution and attachment errors.
///
/// These never abort a session; they are logged where they occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Telemetry environment key is missing or empty")]
    MissingEnvironmentKey,

    #[error("Value {value:?} for {key} is not a valid number")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Failed to attach analytics monitor: {0}")]
    Attach(String),

    #[error("Failed to release analytics monitor: {0}")]
    Release(String),
}
