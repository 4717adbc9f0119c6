//! Capability interfaces of the native collaborators
//!
//! The session never depends on a concrete media engine. It drives the
//! engine through [`MediaEngine`] and learns about playback progress from
//! [`EngineEvent`] notifications delivered by whoever owns the engine's
//! callback thread.

use serde::{Deserialize, Serialize};

use crate::format::MediaSource;

/// Decoded video format as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation the frame needs for display, in degrees
    pub rotation_degrees: u32,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, rotation_degrees: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees,
        }
    }
}

/// Audio attributes requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAttributes {
    /// Content is a movie soundtrack
    pub content_type_movie: bool,
    /// Engine requests and manages audio focus
    pub handle_audio_focus: bool,
}

impl AudioAttributes {
    pub fn for_mix_mode(mix_with_others: bool) -> Self {
        Self {
            content_type_movie: true,
            handle_audio_focus: !mix_with_others,
        }
    }
}

/// Playback states the engine reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Notification from the engine's callback side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged { state: EngineState },
    Error { message: String },
}

impl EngineEvent {
    pub fn state(state: EngineState) -> Self {
        EngineEvent::StateChanged { state }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EngineEvent::Error {
            message: message.into(),
        }
    }
}

/// Native media engine handle.
///
/// All commands are fire-and-forget; results arrive as [`EngineEvent`]s.
pub trait MediaEngine: Send {
    fn set_media_source(&mut self, source: MediaSource);

    fn prepare(&mut self);

    /// Start (`true`) or pause (`false`) playback once ready
    fn set_play_when_ready(&mut self, play: bool);

    fn seek_to(&mut self, position_ms: i64);

    /// Volume in `[0.0, 1.0]`
    fn set_volume(&mut self, volume: f64);

    fn set_playback_speed(&mut self, speed: f64);

    /// Repeat the current item (`true`) or play it once
    fn set_looping(&mut self, looping: bool);

    fn position_ms(&self) -> i64;

    fn buffered_position_ms(&self) -> i64;

    fn duration_ms(&self) -> i64;

    /// Format of the current video track, if the engine knows it
    fn video_format(&self) -> Option<VideoFormat>;

    fn set_video_surface(&mut self, surface: &dyn VideoSurface);

    fn set_audio_attributes(&mut self, attributes: AudioAttributes);

    fn stop(&mut self);

    /// Free the native handle; no other call follows
    fn release(&mut self);
}

/// Texture registry entry backing the rendered frames
pub trait TextureEntry: Send {
    fn id(&self) -> i64;

    /// Create the surface the engine renders into
    fn create_surface(&mut self) -> Box<dyn VideoSurface>;

    fn release(&mut self);
}

/// Surface object wrapping a texture
pub trait VideoSurface: Send {
    fn texture_id(&self) -> i64;

    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_focus_follows_mix_mode() {
        assert!(AudioAttributes::for_mix_mode(false).handle_audio_focus);
        assert!(!AudioAttributes::for_mix_mode(true).handle_audio_focus);
        assert!(AudioAttributes::for_mix_mode(true).content_type_movie);
    }

    #[test]
    fn test_engine_event_json() {
        let event: EngineEvent =
            serde_json::from_str(r#"{"type": "state_changed", "state": "ready"}"#).unwrap();
        assert_eq!(event, EngineEvent::state(EngineState::Ready));

        let event: EngineEvent =
            serde_json::from_str(r#"{"type": "error", "message": "decoder init"}"#).unwrap();
        assert_eq!(event, EngineEvent::error("decoder init"));
    }
}
