//! Playback Session - owns the engine and drives the lifecycle
//!
//! Coordinates:
//! - Media source construction and engine preparation
//! - State machine transitions driven by engine notifications
//! - Translation of notifications into client events
//! - Optional analytics attachment
//! - Ordered teardown

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    analytics::{AnalyticsFactory, AnalyticsMonitor},
    config::SessionRequest,
    engine::{
        AudioAttributes, EngineEvent, EngineState, MediaEngine, TextureEntry, VideoFormat,
        VideoSurface,
    },
    events::{EventChannel, PlayerEvent, VIDEO_ERROR_CODE},
    format::{MediaSource, SourceFormat},
    sink::{QueuingEventSink, StreamHandler},
    telemetry::{self, TelemetryMetadata},
    Error, Result,
};

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Engine created, no media source attached yet
    Idle,
    /// Engine is preparing the media source
    Preparing,
    /// Engine is buffering
    Buffering,
    /// Engine can play immediately
    Ready,
    /// Playback reached the end
    Ended,
    /// Engine reported a playback failure
    Error,
}

impl PlaybackState {
    /// Ended and Error never recover; a new session is needed
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Error)
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        match (self, target) {
            (Idle, Preparing) => true,
            (Idle, Error) => true,
            (Preparing | Buffering | Ready, Buffering | Ready | Ended | Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Preparing => write!(f, "preparing"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// Build the `initialized` event, correcting geometry for display rotation.
///
/// 90/270 degree rotations swap width and height; 180 degrees keeps the
/// geometry and reports `rotationCorrection` so the consumer can invert.
pub fn initialized_event(duration_ms: i64, format: Option<VideoFormat>) -> PlayerEvent {
    let Some(format) = format else {
        return PlayerEvent::Initialized {
            duration: duration_ms,
            width: None,
            height: None,
            rotation_correction: None,
        };
    };

    let (width, height) = match format.rotation_degrees {
        90 | 270 => (format.height, format.width),
        _ => (format.width, format.height),
    };

    PlayerEvent::Initialized {
        duration: duration_ms,
        width: Some(width),
        height: Some(height),
        rotation_correction: (format.rotation_degrees == 180).then_some(180),
    }
}

/// Player session bridging one native engine to one client event stream
pub struct PlaybackSession {
    id: SessionId,
    format: SourceFormat,
    texture_id: i64,
    state: PlaybackState,
    /// Set once, on the first Ready notification
    is_initialized: bool,
    disposed: bool,
    engine: Option<Box<dyn MediaEngine>>,
    texture: Option<Box<dyn TextureEntry>>,
    surface: Option<Box<dyn VideoSurface>>,
    channel: Box<dyn EventChannel>,
    sink: QueuingEventSink,
    analytics: Option<Box<dyn AnalyticsMonitor>>,
    telemetry: Option<TelemetryMetadata>,
}

impl PlaybackSession {
    /// Create a session and start preparing the engine.
    ///
    /// Fails only when no media format can be resolved; in that case the
    /// engine and texture are released before returning.
    #[instrument(skip_all, fields(uri = %request.uri))]
    pub fn new(
        request: SessionRequest,
        mut engine: Box<dyn MediaEngine>,
        mut texture: Box<dyn TextureEntry>,
        mut channel: Box<dyn EventChannel>,
        analytics: &dyn AnalyticsFactory,
    ) -> Result<Self> {
        let id = SessionId::new();

        let source = match MediaSource::build(
            &request.uri,
            request.format_hint.as_deref(),
            &request.http_headers,
        ) {
            Ok(source) => source,
            Err(err) => {
                warn!(session_id = %id, error = %err, "Rejecting playback session");
                texture.release();
                engine.release();
                return Err(err);
            }
        };

        let format = source.format;
        info!(
            session_id = %id,
            format = %format,
            strategy = ?source.strategy,
            "Creating playback session"
        );

        let sink = QueuingEventSink::new();

        engine.set_media_source(source);
        engine.prepare();
        info!(
            session_id = %id,
            from = %PlaybackState::Idle,
            to = %PlaybackState::Preparing,
            "State transition"
        );

        channel.set_stream_handler(Some(StreamHandler::new(sink.clone())));

        let surface = texture.create_surface();
        engine.set_video_surface(surface.as_ref());
        engine.set_audio_attributes(AudioAttributes::for_mix_mode(
            request.options.mix_with_others,
        ));

        let mut session = Self {
            id,
            format,
            texture_id: texture.id(),
            state: PlaybackState::Preparing,
            is_initialized: false,
            disposed: false,
            engine: Some(engine),
            texture: Some(texture),
            surface: Some(surface),
            channel,
            sink,
            analytics: None,
            telemetry: None,
        };

        session.attach_analytics(&request, analytics);

        Ok(session)
    }

    /// Resolve telemetry and attach a monitor; failures only disable analytics
    fn attach_analytics(&mut self, request: &SessionRequest, factory: &dyn AnalyticsFactory) {
        let metadata = match telemetry::resolve(&request.http_headers, &request.uri) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return,
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Telemetry not attached");
                return;
            }
        };

        match factory.attach(&metadata) {
            Ok(monitor) => {
                info!(session_id = %self.id, env = %metadata.environment_key, "Telemetry attached");
                self.analytics = Some(monitor);
                self.telemetry = Some(metadata);
            }
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Telemetry not attached");
            }
        }
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the engine has been ready at least once
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Resolved media format
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Id of the texture the engine renders into
    pub fn texture_id(&self) -> i64 {
        self.texture_id
    }

    /// Telemetry snapshot, present only while analytics is attached
    pub fn telemetry(&self) -> Option<&TelemetryMetadata> {
        self.telemetry.as_ref()
    }

    /// Handle to the session's event sink
    pub fn event_sink(&self) -> QueuingEventSink {
        self.sink.clone()
    }

    /// Transition to new state
    fn set_state(&mut self, new_state: PlaybackState) {
        let current = self.state;
        if current == new_state {
            return;
        }
        if !current.can_transition_to(new_state) {
            warn!(from = %current, to = %new_state, "Unexpected state transition");
        }
        self.state = new_state;
        info!(session_id = %self.id, from = %current, to = %new_state, "State transition");
    }

    fn emit(&mut self, event: PlayerEvent) {
        if let Some(analytics) = self.analytics.as_mut() {
            analytics.on_player_event(&event);
        }
        self.sink.success(event);
    }

    /// Apply one engine notification
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.disposed {
            debug!("Ignoring engine event after dispose");
            return;
        }
        if self.state.is_terminal() {
            debug!(state = %self.state, "Ignoring engine event in terminal state");
            return;
        }

        match event {
            EngineEvent::StateChanged { state: EngineState::Buffering } => {
                self.set_state(PlaybackState::Buffering);
                self.emit(PlayerEvent::BufferingStart);
                self.emit_buffering_update();
            }
            EngineEvent::StateChanged { state: EngineState::Ready } => {
                self.set_state(PlaybackState::Ready);
                if !self.is_initialized {
                    self.is_initialized = true;
                    self.send_initialized();
                }
                self.emit(PlayerEvent::BufferingEnd);
            }
            EngineEvent::StateChanged { state: EngineState::Ended } => {
                self.set_state(PlaybackState::Ended);
                self.emit(PlayerEvent::Completed);
            }
            EngineEvent::StateChanged { state: EngineState::Idle } => {
                debug!("Engine reported idle");
            }
            EngineEvent::Error { message } => {
                error!(error = %message, "Engine playback error");
                self.set_state(PlaybackState::Error);
                if let Some(analytics) = self.analytics.as_mut() {
                    analytics.on_playback_error(&message);
                }
                self.sink.error(
                    VIDEO_ERROR_CODE,
                    format!("Video player had error {message}"),
                    None,
                );
            }
        }
    }

    /// Apply engine notifications until the session ends, is disposed, or
    /// the sender goes away. Returns the final state.
    pub async fn drive(
        &mut self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> PlaybackState {
        while let Some(event) = events.recv().await {
            self.handle_engine_event(event);
            if self.disposed || self.state.is_terminal() {
                break;
            }
        }
        self.state
    }

    fn send_initialized(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let event = initialized_event(engine.duration_ms(), engine.video_format());
        debug!(event = ?event, "Session initialized");
        self.emit(event);
    }

    fn emit_buffering_update(&mut self) {
        if let Some(buffered) = self.engine.as_ref().map(|e| e.buffered_position_ms()) {
            self.emit(PlayerEvent::buffering_update(buffered));
        }
    }

    /// Engine access for client commands
    fn engine_mut(&mut self) -> Result<&mut Box<dyn MediaEngine>> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        if self.state.is_terminal() {
            return Err(Error::InvalidState { state: self.state });
        }
        self.engine.as_mut().ok_or(Error::Disposed)
    }

    /// Start playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn play(&mut self) -> Result<()> {
        self.engine_mut()?.set_play_when_ready(true);
        Ok(())
    }

    /// Pause playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn pause(&mut self) -> Result<()> {
        self.engine_mut()?.set_play_when_ready(false);
        Ok(())
    }

    /// Seek to position in milliseconds
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn seek_to(&mut self, position_ms: i64) -> Result<()> {
        self.engine_mut()?.seek_to(position_ms);
        Ok(())
    }

    /// Set volume, clamped to `[0.0, 1.0]`
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        let clamped = volume.max(0.0).min(1.0);
        self.engine_mut()?.set_volume(clamped);
        Ok(())
    }

    /// Set playback speed factor
    pub fn set_playback_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "playback speed must be positive, got {speed}"
            )));
        }
        self.engine_mut()?.set_playback_speed(speed);
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.engine_mut()?.set_looping(looping);
        Ok(())
    }

    /// Current position in milliseconds; also reports buffered progress
    pub fn position(&mut self) -> Result<i64> {
        let position = self.engine_mut()?.position_ms();
        self.emit_buffering_update();
        Ok(position)
    }

    /// Report buffered progress to the client
    pub fn send_buffering_update(&mut self) -> Result<()> {
        self.engine_mut()?;
        self.emit_buffering_update();
        Ok(())
    }

    /// Tear down the session. Safe to call more than once.
    ///
    /// Order: analytics, engine stop (only if it was ever ready), texture,
    /// stream handler, surface, engine handle.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn dispose(&mut self) {
        if self.disposed {
            debug!("Session already disposed");
            return;
        }
        self.disposed = true;

        if let Some(mut analytics) = self.analytics.take() {
            if let Err(err) = analytics.release() {
                warn!(error = %err, "Analytics release failed, continuing teardown");
            }
        }
        self.telemetry = None;

        if self.is_initialized {
            if let Some(engine) = self.engine.as_mut() {
                engine.stop();
            }
        }

        if let Some(mut texture) = self.texture.take() {
            texture.release();
        }

        self.channel.set_stream_handler(None);
        self.sink.set_delegate(None);

        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }

        if let Some(mut engine) = self.engine.take() {
            engine.release();
        }

        info!("Playback session disposed");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("state", &self.state)
            .field("is_initialized", &self.is_initialized)
            .field("disposed", &self.disposed)
            .field("analytics", &self.analytics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::TracingAnalytics;
    use crate::mock::{CallLog, CollectingListener, MockChannel, MockEngine, MockTexture};

    fn session_with(
        engine: MockEngine,
        log: &CallLog,
    ) -> (PlaybackSession, crate::mock::ChannelHandle) {
        let (channel, handle) = MockChannel::new(log.clone());
        let session = PlaybackSession::new(
            SessionRequest::new("https://cdn.example.com/master.m3u8"),
            Box::new(engine),
            Box::new(MockTexture::new(7, log.clone())),
            Box::new(channel),
            &TracingAnalytics,
        )
        .unwrap();
        (session, handle)
    }

    #[test]
    fn test_session_creation() {
        let log = CallLog::new();
        let (session, handle) = session_with(MockEngine::new(log.clone()), &log);

        assert_eq!(session.state(), PlaybackState::Preparing);
        assert_eq!(session.format(), SourceFormat::Hls);
        assert_eq!(session.texture_id(), 7);
        assert!(!session.is_initialized());
        assert!(handle.is_registered());
        assert_eq!(
            log.calls(),
            vec![
                "engine.set_media_source:hls",
                "engine.prepare",
                "channel.set_handler",
                "texture.create_surface",
                "engine.set_surface:7",
                "engine.audio_focus:true",
            ]
        );
    }

    #[test]
    fn test_state_transitions() {
        use PlaybackState::*;

        assert!(Idle.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Buffering));
        assert!(Buffering.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Buffering));
        assert!(Buffering.can_transition_to(Buffering));
        assert!(Ready.can_transition_to(Ended));
        assert!(Buffering.can_transition_to(Error));

        assert!(!Idle.can_transition_to(Ready));
        assert!(!Ended.can_transition_to(Buffering));
        assert!(!Error.can_transition_to(Ready));
        assert!(!Ended.can_transition_to(Error));
    }

    #[test]
    fn test_initialized_event_rotation() {
        let swap = initialized_event(1000, Some(VideoFormat::new(1920, 1080, 90)));
        assert_eq!(
            swap,
            PlayerEvent::Initialized {
                duration: 1000,
                width: Some(1080),
                height: Some(1920),
                rotation_correction: None
            }
        );

        let swap = initialized_event(1000, Some(VideoFormat::new(1920, 1080, 270)));
        assert_eq!(
            swap,
            PlayerEvent::Initialized {
                duration: 1000,
                width: Some(1080),
                height: Some(1920),
                rotation_correction: None
            }
        );

        let flipped = initialized_event(1000, Some(VideoFormat::new(1920, 1080, 180)));
        assert_eq!(
            flipped,
            PlayerEvent::Initialized {
                duration: 1000,
                width: Some(1920),
                height: Some(1080),
                rotation_correction: Some(180)
            }
        );

        let upright = initialized_event(1000, Some(VideoFormat::new(1920, 1080, 0)));
        assert_eq!(
            upright,
            PlayerEvent::Initialized {
                duration: 1000,
                width: Some(1920),
                height: Some(1080),
                rotation_correction: None
            }
        );

        let audio_only = initialized_event(1000, None);
        assert_eq!(
            audio_only,
            PlayerEvent::Initialized {
                duration: 1000,
                width: None,
                height: None,
                rotation_correction: None
            }
        );
    }

    #[test]
    fn test_ready_emits_initialized_once() {
        let log = CallLog::new();
        let engine = MockEngine::new(log.clone()).with_duration(60_000);
        let (mut session, handle) = session_with(engine, &log);
        let listener = CollectingListener::new();
        handle.listen(listener.clone());

        session.handle_engine_event(EngineEvent::state(EngineState::Ready));
        session.handle_engine_event(EngineEvent::state(EngineState::Buffering));
        session.handle_engine_event(EngineEvent::state(EngineState::Ready));

        assert!(session.is_initialized());
        assert_eq!(session.state(), PlaybackState::Ready);
        assert_eq!(
            listener.event_names(),
            vec![
                "initialized",
                "bufferingEnd",
                "bufferingStart",
                "bufferingUpdate",
                "bufferingEnd",
            ]
        );
    }

    #[test]
    fn test_repeated_buffering_is_forwarded() {
        let log = CallLog::new();
        let (mut session, _handle) = session_with(MockEngine::new(log.clone()), &log);

        session.handle_engine_event(EngineEvent::state(EngineState::Buffering));
        session.handle_engine_event(EngineEvent::state(EngineState::Buffering));

        assert_eq!(session.state(), PlaybackState::Buffering);
        // bufferingStart + bufferingUpdate per notification
        assert_eq!(session.event_sink().pending_len(), 4);
    }

    #[test]
    fn test_error_is_terminal() {
        let log = CallLog::new();
        let (mut session, handle) = session_with(MockEngine::new(log.clone()), &log);
        let listener = CollectingListener::new();
        handle.listen(listener.clone());

        session.handle_engine_event(EngineEvent::error("Source error"));
        session.handle_engine_event(EngineEvent::state(EngineState::Ready));

        assert_eq!(session.state(), PlaybackState::Error);
        assert!(!session.is_initialized());
        assert!(matches!(session.play(), Err(Error::InvalidState { state: PlaybackState::Error })));

        let messages = listener.messages();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            crate::events::SinkMessage::Error { code, message, .. } => {
                assert_eq!(code, "VideoError");
                assert_eq!(message, "Video player had error Source error");
            }
            other => panic!("expected error message, got {:?}", other),
        }
    }

    #[test]
    fn test_volume_is_clamped() {
        let log = CallLog::new();
        let (mut session, _handle) = session_with(MockEngine::new(log.clone()), &log);

        session.set_volume(1.5).unwrap();
        session.set_volume(-0.2).unwrap();
        session.set_volume(0.25).unwrap();

        assert!(log.contains("engine.volume:1"));
        assert!(log.contains("engine.volume:0"));
        assert!(log.contains("engine.volume:0.25"));
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let log = CallLog::new();
        let (mut session, _handle) = session_with(MockEngine::new(log.clone()), &log);

        assert!(matches!(session.set_playback_speed(0.0), Err(Error::InvalidConfig(_))));
        assert!(matches!(session.set_playback_speed(f64::NAN), Err(Error::InvalidConfig(_))));
        session.set_playback_speed(1.5).unwrap();
        assert!(log.contains("engine.speed:1.5"));
    }

    #[test]
    fn test_drop_disposes() {
        let log = CallLog::new();
        let (session, _handle) = session_with(MockEngine::new(log.clone()), &log);
        drop(session);

        assert_eq!(log.count("engine.release"), 1);
        assert!(!log.contains("engine.stop"));
    }

    #[tokio::test]
    async fn test_drive_until_completed() {
        let log = CallLog::new();
        let (mut session, handle) = session_with(MockEngine::new(log.clone()), &log);
        let listener = CollectingListener::new();
        handle.listen(listener.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(EngineEvent::state(EngineState::Buffering)).unwrap();
        tx.send(EngineEvent::state(EngineState::Ready)).unwrap();
        tx.send(EngineEvent::state(EngineState::Ended)).unwrap();
        tx.send(EngineEvent::state(EngineState::Buffering)).unwrap();

        let state = session.drive(rx).await;

        assert_eq!(state, PlaybackState::Ended);
        assert_eq!(
            listener.event_names().last().map(String::as_str),
            Some("completed")
        );
    }
}
