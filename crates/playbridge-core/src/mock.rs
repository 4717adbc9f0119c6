//! In-memory collaborators for tests and simulations
//!
//! Every mock appends to a shared [`CallLog`] so callers can assert on the
//! exact order in which a session touched its collaborators.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::analytics::{AnalyticsFactory, AnalyticsMonitor};
use crate::engine::{AudioAttributes, MediaEngine, TextureEntry, VideoFormat, VideoSurface};
use crate::error::TelemetryError;
use crate::events::{EventChannel, EventListener, PlayerEvent, SinkMessage};
use crate::format::MediaSource;
use crate::sink::StreamHandler;
use crate::telemetry::TelemetryMetadata;

/// Ordered record of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.count(call) > 0
    }

    /// Position of the first matching call
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c == call)
    }
}

/// Engine that records commands and reports configurable progress
#[derive(Debug)]
pub struct MockEngine {
    log: CallLog,
    source: Option<MediaSource>,
    duration_ms: i64,
    position_ms: i64,
    buffered_ms: i64,
    video_format: Option<VideoFormat>,
}

impl MockEngine {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            source: None,
            duration_ms: 0,
            position_ms: 0,
            buffered_ms: 0,
            video_format: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_buffered(mut self, buffered_ms: i64) -> Self {
        self.buffered_ms = buffered_ms;
        self
    }

    pub fn with_video_format(mut self, format: VideoFormat) -> Self {
        self.video_format = Some(format);
        self
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }
}

impl MediaEngine for MockEngine {
    fn set_media_source(&mut self, source: MediaSource) {
        self.log
            .record(format!("engine.set_media_source:{}", source.format.token()));
        self.source = Some(source);
    }

    fn prepare(&mut self) {
        self.log.record("engine.prepare");
    }

    fn set_play_when_ready(&mut self, play: bool) {
        self.log.record(if play { "engine.play" } else { "engine.pause" });
    }

    fn seek_to(&mut self, position_ms: i64) {
        self.position_ms = position_ms;
        self.log.record(format!("engine.seek:{position_ms}"));
    }

    fn set_volume(&mut self, volume: f64) {
        self.log.record(format!("engine.volume:{volume}"));
    }

    fn set_playback_speed(&mut self, speed: f64) {
        self.log.record(format!("engine.speed:{speed}"));
    }

    fn set_looping(&mut self, looping: bool) {
        self.log.record(format!("engine.looping:{looping}"));
    }

    fn position_ms(&self) -> i64 {
        self.position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.buffered_ms
    }

    fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    fn video_format(&self) -> Option<VideoFormat> {
        self.video_format
    }

    fn set_video_surface(&mut self, surface: &dyn VideoSurface) {
        self.log
            .record(format!("engine.set_surface:{}", surface.texture_id()));
    }

    fn set_audio_attributes(&mut self, attributes: AudioAttributes) {
        self.log.record(format!(
            "engine.audio_focus:{}",
            attributes.handle_audio_focus
        ));
    }

    fn stop(&mut self) {
        self.log.record("engine.stop");
    }

    fn release(&mut self) {
        self.log.record("engine.release");
    }
}

/// Texture entry with a fixed id
#[derive(Debug)]
pub struct MockTexture {
    id: i64,
    log: CallLog,
}

impl MockTexture {
    pub fn new(id: i64, log: CallLog) -> Self {
        Self { id, log }
    }
}

impl TextureEntry for MockTexture {
    fn id(&self) -> i64 {
        self.id
    }

    fn create_surface(&mut self) -> Box<dyn VideoSurface> {
        self.log.record("texture.create_surface");
        Box::new(MockSurface {
            texture_id: self.id,
            log: self.log.clone(),
        })
    }

    fn release(&mut self) {
        self.log.record("texture.release");
    }
}

#[derive(Debug)]
struct MockSurface {
    texture_id: i64,
    log: CallLog,
}

impl VideoSurface for MockSurface {
    fn texture_id(&self) -> i64 {
        self.texture_id
    }

    fn release(&mut self) {
        self.log.record("surface.release");
    }
}

/// Client side of a [`MockChannel`]: subscribes and unsubscribes listeners
#[derive(Debug, Clone, Default)]
pub struct ChannelHandle {
    handler: Arc<Mutex<Option<StreamHandler>>>,
}

impl ChannelHandle {
    pub fn is_registered(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Subscribe a listener; returns false if no handler is registered
    pub fn listen(&self, listener: Arc<dyn EventListener>) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler.on_listen(listener);
                true
            }
            None => false,
        }
    }

    pub fn cancel(&self) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler.on_cancel();
                true
            }
            None => false,
        }
    }
}

/// Event channel that exposes its stream handler through a [`ChannelHandle`]
#[derive(Debug)]
pub struct MockChannel {
    handle: ChannelHandle,
    log: CallLog,
}

impl MockChannel {
    pub fn new(log: CallLog) -> (Self, ChannelHandle) {
        let handle = ChannelHandle::default();
        (
            Self {
                handle: handle.clone(),
                log,
            },
            handle,
        )
    }
}

impl EventChannel for MockChannel {
    fn set_stream_handler(&mut self, handler: Option<StreamHandler>) {
        self.log.record(if handler.is_some() {
            "channel.set_handler"
        } else {
            "channel.clear_handler"
        });
        *self.handle.handler.lock() = handler;
    }
}

/// Listener that keeps every delivered message
#[derive(Debug, Default)]
pub struct CollectingListener {
    messages: Mutex<Vec<SinkMessage>>,
}

impl CollectingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages.lock().clone()
    }

    /// Event names, with error-class messages reported by their code
    pub fn event_names(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|message| match message {
                SinkMessage::Success(event) => event.name().to_string(),
                SinkMessage::Error { code, .. } => code.clone(),
            })
            .collect()
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.messages
            .lock()
            .iter()
            .filter_map(|message| match message {
                SinkMessage::Success(event) => Some(event.clone()),
                SinkMessage::Error { .. } => None,
            })
            .collect()
    }
}

impl EventListener for CollectingListener {
    fn success(&self, event: PlayerEvent) {
        self.messages.lock().push(SinkMessage::Success(event));
    }

    fn error(&self, code: &str, message: &str, details: Option<&serde_json::Value>) {
        self.messages.lock().push(SinkMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
            details: details.cloned(),
        });
    }
}

/// Analytics factory with switchable failures
#[derive(Debug, Clone, Default)]
pub struct MockAnalytics {
    log: CallLog,
    fail_attach: bool,
    fail_release: bool,
    attached: Arc<Mutex<Vec<TelemetryMetadata>>>,
}

impl MockAnalytics {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn failing_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Metadata of every successfully attached monitor
    pub fn attached(&self) -> Vec<TelemetryMetadata> {
        self.attached.lock().clone()
    }
}

impl AnalyticsFactory for MockAnalytics {
    fn attach(
        &self,
        metadata: &TelemetryMetadata,
    ) -> Result<Box<dyn AnalyticsMonitor>, TelemetryError> {
        self.log.record("analytics.attach");
        if self.fail_attach {
            return Err(TelemetryError::Attach("collector unavailable".into()));
        }
        self.attached.lock().push(metadata.clone());
        Ok(Box::new(MockMonitor {
            log: self.log.clone(),
            fail_release: self.fail_release,
        }))
    }
}

#[derive(Debug)]
struct MockMonitor {
    log: CallLog,
    fail_release: bool,
}

impl AnalyticsMonitor for MockMonitor {
    fn on_player_event(&mut self, event: &PlayerEvent) {
        self.log.record(format!("analytics.event:{}", event.name()));
    }

    fn on_playback_error(&mut self, _message: &str) {
        self.log.record("analytics.error");
    }

    fn release(&mut self) -> Result<(), TelemetryError> {
        self.log.record("analytics.release");
        if self.fail_release {
            return Err(TelemetryError::Release("flush failed".into()));
        }
        Ok(())
    }
}
