//! Analytics attachment
//!
//! A monitor is built from a resolved [`TelemetryMetadata`] snapshot and
//! observes the session's translated events until the session releases it.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TelemetryError;
use crate::events::PlayerEvent;
use crate::telemetry::TelemetryMetadata;

/// Analytics monitor owned by a playback session
pub trait AnalyticsMonitor: Send {
    /// Observe a success-class event sent to the client
    fn on_player_event(&mut self, _event: &PlayerEvent) {}

    /// Observe an engine playback failure
    fn on_playback_error(&mut self, _message: &str) {}

    /// Flush and detach. Called once, before the engine is released.
    fn release(&mut self) -> Result<(), TelemetryError>;
}

/// Builds monitors for sessions that opted into telemetry
pub trait AnalyticsFactory: Send + Sync {
    fn attach(
        &self,
        metadata: &TelemetryMetadata,
    ) -> Result<Box<dyn AnalyticsMonitor>, TelemetryError>;
}

/// Factory for monitors that report through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsFactory for TracingAnalytics {
    fn attach(
        &self,
        metadata: &TelemetryMetadata,
    ) -> Result<Box<dyn AnalyticsMonitor>, TelemetryError> {
        Ok(Box::new(TracingMonitor::new(metadata.clone())))
    }
}

/// Monitor that logs a view summary on release
#[derive(Debug)]
pub struct TracingMonitor {
    view_id: Uuid,
    metadata: TelemetryMetadata,
    started_at: DateTime<Utc>,
    rebuffer_count: u32,
    event_count: u64,
    error_count: u32,
    released: bool,
}

impl TracingMonitor {
    pub fn new(metadata: TelemetryMetadata) -> Self {
        let view_id = Uuid::new_v4();
        info!(
            view_id = %view_id,
            env = %metadata.environment_key,
            title = %metadata.video_title,
            view_session = %metadata.session_id,
            "Analytics monitor attached"
        );

        Self {
            view_id,
            metadata,
            started_at: Utc::now(),
            rebuffer_count: 0,
            event_count: 0,
            error_count: 0,
            released: false,
        }
    }

    pub fn view_id(&self) -> Uuid {
        self.view_id
    }

    pub fn metadata(&self) -> &TelemetryMetadata {
        &self.metadata
    }

    pub fn rebuffer_count(&self) -> u32 {
        self.rebuffer_count
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}

impl AnalyticsMonitor for TracingMonitor {
    fn on_player_event(&mut self, event: &PlayerEvent) {
        self.event_count += 1;
        if *event == PlayerEvent::BufferingStart {
            self.rebuffer_count += 1;
        }
        debug!(view_id = %self.view_id, event = event.name(), "Analytics event");
    }

    fn on_playback_error(&mut self, message: &str) {
        self.error_count += 1;
        debug!(view_id = %self.view_id, reason = message, "Analytics error");
    }

    fn release(&mut self) -> Result<(), TelemetryError> {
        if self.released {
            return Err(TelemetryError::Release("monitor already released".into()));
        }
        self.released = true;

        let watch_time = Utc::now() - self.started_at;
        info!(
            view_id = %self.view_id,
            watch_time_ms = watch_time.num_milliseconds(),
            events = self.event_count,
            rebuffers = self.rebuffer_count,
            errors = self.error_count,
            "Analytics view ended"
        );
        Ok(())
    }
}
