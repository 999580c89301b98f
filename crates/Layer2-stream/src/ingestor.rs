//! Stream ingestor
//!
//! [`StreamIngestor::open`]은 세션 태스크를 spawn하고 즉시 [`StreamHandle`]을 반환합니다.
//!
//! ## 상태 전이
//!
//! ```text
//! connecting ──► streaming ──► closed     (body ended)
//!     │              │
//!     ├──────────────┴───────► failed     (connect/status/read error)
//!     └──────────────┴───────► cancelled  (StreamHandle::close)
//! ```
//!
//! Sink callbacks and `close()` are serialized through one re-entrant gate,
//! so once `close()` returns no callback runs again, even when `close()` is
//! called from inside a callback.

use crate::decoder::event_stream;
use crate::event::SseEvent;
use crate::sink::EventSink;
use crate::transport::{HttpTransport, StreamRequest, StreamTransport};
use futures::StreamExt;
use herd_foundation::StreamConfig;
use parking_lot::ReentrantMutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// StreamState
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Nothing opened
    Idle,
    Connecting,
    Streaming,
    /// Body ended normally
    Closed,
    Failed,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Closed | StreamState::Failed | StreamState::Cancelled
        )
    }

    /// Connecting or streaming
    pub fn is_active(&self) -> bool {
        matches!(self, StreamState::Connecting | StreamState::Streaming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Connecting => "connecting",
            StreamState::Streaming => "streaming",
            StreamState::Closed => "closed",
            StreamState::Failed => "failed",
            StreamState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Shared session state
// ============================================================================

struct SessionShared {
    id: Uuid,
    state: watch::Sender<StreamState>,
    gate: ReentrantMutex<()>,
    token: CancellationToken,
}

impl SessionShared {
    fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    fn cancel(&self) {
        let _gate = self.gate.lock();
        if !self.state().is_active() {
            return;
        }
        self.state.send_replace(StreamState::Cancelled);
        self.token.cancel();
        tracing::debug!(session = %self.id, "Stream cancelled");
    }

    fn begin_streaming(&self) -> bool {
        let _gate = self.gate.lock();
        if self.state() != StreamState::Connecting {
            return false;
        }
        self.state.send_replace(StreamState::Streaming);
        true
    }

    /// Run a non-terminal callback; false once the session is no longer active
    fn deliver(&self, callback: impl FnOnce()) -> bool {
        let _gate = self.gate.lock();
        if !self.state().is_active() {
            return false;
        }
        callback();
        self.state().is_active()
    }

    /// Run the terminal callback, then publish the terminal state
    fn finish(&self, terminal: StreamState, callback: impl FnOnce()) {
        let _gate = self.gate.lock();
        if !self.state().is_active() {
            return;
        }
        callback();
        // A close() from inside the callback already published Cancelled.
        if self.state().is_active() {
            self.state.send_replace(terminal);
        }
    }
}

// ============================================================================
// StreamHandle
// ============================================================================

/// Control handle for one open session
///
/// Dropping the handle does not close the session. Clones control the same session.
#[derive(Clone)]
pub struct StreamHandle {
    shared: Arc<SessionShared>,
}

impl StreamHandle {
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Stop the session and abort the request
    ///
    /// Idempotent. No sink callback runs after this returns. A session that
    /// already closed or failed keeps its state.
    pub fn close(&self) {
        self.shared.cancel();
    }

    /// Wait for a terminal state
    pub async fn finished(&self) -> StreamState {
        let mut rx = self.shared.state.subscribe();
        let result = rx.wait_for(StreamState::is_terminal).await.map(|state| *state);
        result.unwrap_or_else(|_| self.state())
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// StreamIngestor
// ============================================================================

/// Opens streaming sessions over a transport
pub struct StreamIngestor<T: StreamTransport = HttpTransport> {
    transport: Arc<T>,
}

impl<T: StreamTransport> Clone for StreamIngestor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl StreamIngestor<HttpTransport> {
    pub fn http(config: StreamConfig) -> Self {
        Self::new(HttpTransport::new(config))
    }
}

impl<T: StreamTransport> StreamIngestor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a session. Must be called inside a tokio runtime.
    ///
    /// Returns immediately in the connecting state. Every outcome, including
    /// a refused connection, reaches the sink rather than the caller.
    pub fn open<S>(&self, request: StreamRequest, sink: S) -> StreamHandle
    where
        S: EventSink + 'static,
    {
        let (state, _) = watch::channel(StreamState::Connecting);
        let shared = Arc::new(SessionShared {
            id: Uuid::new_v4(),
            state,
            gate: ReentrantMutex::new(()),
            token: CancellationToken::new(),
        });

        tracing::debug!(session = %shared.id, url = %request.url, "Stream opening");
        tokio::spawn(run_session(
            Arc::clone(&self.transport),
            request,
            sink,
            Arc::clone(&shared),
        ));

        StreamHandle { shared }
    }
}

async fn run_session<T, S>(
    transport: Arc<T>,
    request: StreamRequest,
    mut sink: S,
    shared: Arc<SessionShared>,
) where
    T: StreamTransport,
    S: EventSink,
{
    let connected = tokio::select! {
        biased;
        _ = shared.token.cancelled() => return,
        result = transport.connect(&request) => result,
    };

    let bytes = match connected {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::debug!(session = %shared.id, %error, "Stream connect failed");
            shared.finish(StreamState::Failed, || sink.on_error(error));
            return;
        }
    };

    if !shared.begin_streaming() {
        return;
    }

    let mut events = event_stream(bytes);
    let mut delivered = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.token.cancelled() => break,
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                delivered += 1;
                trace_event(&shared.id, &event);
                if !shared.deliver(|| sink.on_event(event)) {
                    break;
                }
            }
            Some(Err(error)) => {
                tracing::debug!(session = %shared.id, %error, "Stream read failed");
                shared.finish(StreamState::Failed, || sink.on_error(error));
                break;
            }
            None => {
                shared.finish(StreamState::Closed, || sink.on_close());
                break;
            }
        }
    }

    tracing::debug!(
        session = %shared.id,
        events = delivered,
        state = %shared.state(),
        "Stream ended"
    );
}

fn trace_event(session: &Uuid, event: &SseEvent) {
    tracing::trace!(
        session = %session,
        event_type = %event.kind,
        bytes = event.data.len(),
        "Stream event"
    );
}
