//! Outbound client events and the listener contract of the transport.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::sink::StreamHandler;

/// Error kind reported for engine playback failures
pub const VIDEO_ERROR_CODE: &str = "VideoError";

/// Success-class events delivered to the client, tagged by `event`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Engine started buffering
    BufferingStart,

    /// Engine became ready after buffering
    BufferingEnd,

    /// Buffered ranges, as `[start, end]` pairs in milliseconds
    BufferingUpdate { values: Vec<[i64; 2]> },

    /// First readiness of the session
    Initialized {
        duration: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(
            default,
            rename = "rotationCorrection",
            skip_serializing_if = "Option::is_none"
        )]
        rotation_correction: Option<u32>,
    },

    /// Playback reached the end of the media
    Completed,
}

impl PlayerEvent {
    /// Buffering update covering `[0, buffered_ms]`
    pub fn buffering_update(buffered_ms: i64) -> Self {
        PlayerEvent::BufferingUpdate {
            values: vec![[0, buffered_ms]],
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::BufferingStart => "bufferingStart",
            PlayerEvent::BufferingEnd => "bufferingEnd",
            PlayerEvent::BufferingUpdate { .. } => "bufferingUpdate",
            PlayerEvent::Initialized { .. } => "initialized",
            PlayerEvent::Completed => "completed",
        }
    }
}

/// A single message on the client event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SinkMessage {
    Success(PlayerEvent),
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

impl SinkMessage {
    /// Hand this message to a listener using the matching callback
    pub fn deliver_to(self, listener: &dyn EventListener) {
        match self {
            SinkMessage::Success(event) => listener.success(event),
            SinkMessage::Error {
                code,
                message,
                details,
            } => listener.error(&code, &message, details.as_ref()),
        }
    }
}

/// Downstream listener supplied by the client transport.
///
/// Callbacks may detach the listener or produce further events; those are
/// delivered after the current callback returns.
pub trait EventListener: Send + Sync {
    /// Deliver a success-class event
    fn success(&self, event: PlayerEvent);

    /// Deliver an error-class event
    fn error(&self, code: &str, message: &str, details: Option<&serde_json::Value>);
}

/// Transport endpoint that carries one session's events to the client.
///
/// The transport invokes the registered [`StreamHandler`] when the client
/// starts or stops listening.
pub trait EventChannel: Send {
    /// Register or clear the stream handler
    fn set_stream_handler(&mut self, handler: Option<StreamHandler>);
}

/// Listener that forwards every message into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::UnboundedSender<SinkMessage>) -> Self {
        Self { tx }
    }

    /// Create a listener together with its receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn forward(&self, message: SinkMessage) {
        if self.tx.send(message).is_err() {
            debug!("Event receiver dropped, discarding message");
        }
    }
}

impl EventListener for ChannelListener {
    fn success(&self, event: PlayerEvent) {
        self.forward(SinkMessage::Success(event));
    }

    fn error(&self, code: &str, message: &str, details: Option<&serde_json::Value>) {
        self.forward(SinkMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
            details: details.cloned(),
        });
    }
}
