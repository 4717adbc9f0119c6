//! Playbridge Core - Playback session bridge
//!
//! This crate wraps a native media engine behind a uniform lifecycle and
//! event stream for a remote client:
//! - Playback session state machine (prepare, buffering, completion, error)
//! - Queuing event sink that tolerates late listeners
//! - Media source format resolution (SmoothStreaming, DASH, HLS, progressive)
//! - Analytics metadata resolution from request headers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Playbridge Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Format    │  │  Telemetry   │  │   Queuing    │           │
//! │  │   Resolver   │  │   Resolver   │  │  Event Sink  │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Analytics  │  │    Media    │  │    Event     │            │
//! │  │   Monitor    │  │   Engine    │  │   Channel    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod config;
pub mod events;
pub mod sink;
pub mod format;
pub mod telemetry;
pub mod analytics;
pub mod engine;
pub mod session;

/// In-process test doubles used by the CLI simulator and the test suites
#[doc(hidden)]
pub mod mock;

pub use error::{Error, Result, TelemetryError};
pub use config::{SessionRequest, VideoPlayerOptions};
pub use events::{ChannelListener, EventChannel, EventListener, PlayerEvent, SinkMessage};
pub use sink::{QueuingEventSink, StreamHandler};
pub use format::{DataSourceConfig, MediaSource, SourceFormat, SourceStrategy};
pub use telemetry::TelemetryMetadata;
pub use analytics::{AnalyticsFactory, AnalyticsMonitor, TracingAnalytics};
pub use engine::{EngineEvent, EngineState, MediaEngine, TextureEntry, VideoFormat, VideoSurface};
pub use session::{PlaybackSession, PlaybackState, SessionId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Playbridge Core initialized");
}
