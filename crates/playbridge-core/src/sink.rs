//! Queuing event sink
//!
//! Buffers outbound messages until a downstream listener attaches, then
//! forwards immediately. One caller at a time drains the queue, so the
//! backlog and concurrently produced messages never interleave out of
//! order. Listeners are called without the sink lock held and may detach
//! or produce from inside a callback.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::events::{EventListener, PlayerEvent, SinkMessage};

#[derive(Default)]
struct SinkInner {
    delegate: Option<Arc<dyn EventListener>>,
    pending: VecDeque<SinkMessage>,
    /// Some caller is draining `pending`
    delivering: bool,
}

/// Event sink that tolerates a listener attaching after events fired.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct QueuingEventSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl QueuingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (`Some`) or detach (`None`) the downstream listener.
    ///
    /// Attaching drains every pending message to the new listener in the
    /// order it was produced.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn EventListener>>) {
        {
            let mut inner = self.inner.lock();
            inner.delegate = delegate;

            if inner.delegate.is_none() {
                trace!("Listener detached");
                return;
            }
            trace!(pending = inner.pending.len(), "Listener attached");
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        self.drain();
    }

    /// Enqueue or forward a success-class event
    pub fn success(&self, event: PlayerEvent) {
        self.push(SinkMessage::Success(event));
    }

    /// Enqueue or forward an error-class event
    pub fn error(
        &self,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        self.push(SinkMessage::Error {
            code: code.into(),
            message: message.into(),
            details,
        });
    }

    /// Whether a listener is currently attached
    pub fn has_delegate(&self) -> bool {
        self.inner.lock().delegate.is_some()
    }

    /// Number of messages waiting for a listener
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    fn push(&self, message: SinkMessage) {
        {
            let mut inner = self.inner.lock();
            inner.pending.push_back(message);
            if inner.delivering || inner.delegate.is_none() {
                return;
            }
            inner.delivering = true;
        }
        self.drain();
    }

    /// Deliver pending messages one at a time until the queue is empty or
    /// the listener goes away. Only the caller that set `delivering` runs
    /// this; anything queued meanwhile is picked up before it stops.
    fn drain(&self) {
        loop {
            let (listener, message) = {
                let mut inner = self.inner.lock();
                let next = match inner.delegate.clone() {
                    Some(listener) => inner.pending.pop_front().map(|m| (listener, m)),
                    None => None,
                };
                match next {
                    Some(next) => next,
                    None => {
                        inner.delivering = false;
                        return;
                    }
                }
            };
            message.deliver_to(listener.as_ref());
        }
    }
}

impl std::fmt::Debug for QueuingEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("QueuingEventSink")
            .field("attached", &inner.delegate.is_some())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Handler registered with an [`EventChannel`](crate::events::EventChannel).
///
/// The transport calls [`on_listen`](Self::on_listen) when the client
/// subscribes and [`on_cancel`](Self::on_cancel) when it goes away.
#[derive(Clone, Debug)]
pub struct StreamHandler {
    sink: QueuingEventSink,
}

impl StreamHandler {
    pub fn new(sink: QueuingEventSink) -> Self {
        Self { sink }
    }

    pub fn on_listen(&self, listener: Arc<dyn EventListener>) {
        self.sink.set_delegate(Some(listener));
    }

    pub fn on_cancel(&self) {
        self.sink.set_delegate(None);
    }
}
