//! Session controller
//!
//! 하나의 사용자 작업(예: "추천 스트리밍")에 묶인 스트림 세션을 관리합니다.
//! 동시에 최대 하나의 세션만 활성 상태입니다. 새 세션을 시작하면 이전 세션을
//! 먼저 닫고, 누적 버퍼와 에러를 초기화합니다.

use crate::error::StreamError;
use crate::event::SseEvent;
use crate::ingestor::{StreamHandle, StreamIngestor, StreamState};
use crate::sink::{EventSink, NullSink};
use crate::transport::{HttpTransport, StreamRequest, StreamTransport};
use parking_lot::Mutex;
use std::sync::Arc;

/// Point-in-time view of the current session's accumulated output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Concatenated data of every `message` event
    pub buffer: String,
    /// Message of the terminal error, if the session failed
    pub error: Option<String>,
    pub streaming: bool,
    /// Events of any type delivered so far
    pub events: usize,
}

type Progress = Arc<Mutex<SessionSnapshot>>;

/// Records progress, then forwards to the caller's sink
struct TrackingSink<S> {
    progress: Progress,
    observer: S,
}

impl<S: EventSink> EventSink for TrackingSink<S> {
    fn on_event(&mut self, event: SseEvent) {
        {
            let mut progress = self.progress.lock();
            progress.events += 1;
            if event.kind.is_message() {
                progress.buffer.push_str(&event.data);
            }
        }
        self.observer.on_event(event);
    }

    fn on_error(&mut self, error: StreamError) {
        {
            let mut progress = self.progress.lock();
            progress.error = Some(error.to_string());
            progress.streaming = false;
        }
        self.observer.on_error(error);
    }

    fn on_close(&mut self) {
        self.progress.lock().streaming = false;
        self.observer.on_close();
    }
}

/// Owns at most one live stream
pub struct StreamSession<T: StreamTransport = HttpTransport> {
    ingestor: StreamIngestor<T>,
    handle: Mutex<Option<StreamHandle>>,
    progress: Mutex<Progress>,
}

impl<T: StreamTransport> StreamSession<T> {
    pub fn new(ingestor: StreamIngestor<T>) -> Self {
        Self {
            ingestor,
            handle: Mutex::new(None),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Start a new session, replacing any current one
    pub fn start(&self, request: StreamRequest) {
        self.start_with(request, NullSink);
    }

    /// Start a new session and forward every signal to `observer`
    pub fn start_with<S>(&self, request: StreamRequest, observer: S)
    where
        S: EventSink + 'static,
    {
        // close() waits for a running callback, which may call back into this session
        let previous = self.handle.lock().take();
        if let Some(previous) = previous {
            tracing::debug!(session = %previous.id(), "Replacing active stream");
            previous.close();
        }

        let progress = Arc::new(Mutex::new(SessionSnapshot {
            streaming: true,
            ..SessionSnapshot::default()
        }));
        *self.progress.lock() = Arc::clone(&progress);

        let sink = TrackingSink { progress, observer };
        let opened = self.ingestor.open(request, sink);
        let raced = self.handle.lock().replace(opened);
        if let Some(raced) = raced {
            raced.close();
        }
    }

    /// Close the current session. Returns false when nothing is active.
    ///
    /// The closed handle is kept so [`state`](Self::state) reports `Cancelled`.
    pub fn cancel(&self) -> bool {
        let current = self.handle.lock().as_ref().cloned();
        let Some(current) = current.filter(StreamHandle::is_active) else {
            return false;
        };
        current.close();
        self.progress.lock().lock().streaming = false;
        true
    }

    /// Cancel, forget the session and clear accumulated output
    pub fn reset(&self) {
        self.cancel();
        self.handle.lock().take();
        *self.progress.lock() = Progress::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.progress.lock().lock().clone()
    }

    pub fn buffer(&self) -> String {
        self.snapshot().buffer
    }

    pub fn error(&self) -> Option<String> {
        self.snapshot().error
    }

    pub fn is_streaming(&self) -> bool {
        self.snapshot().streaming
    }

    /// State of the latest session, `Idle` when none was started or after reset
    pub fn state(&self) -> StreamState {
        self.handle
            .lock()
            .as_ref()
            .map(StreamHandle::state)
            .unwrap_or(StreamState::Idle)
    }

    /// Wait for the current session to reach a terminal state
    pub async fn wait(&self) -> StreamState {
        let rx = self.handle.lock().as_ref().map(StreamHandle::subscribe);
        match rx {
            Some(mut rx) => {
                let result = rx.wait_for(StreamState::is_terminal).await.map(|s| *s);
                result.unwrap_or(StreamState::Cancelled)
            }
            None => StreamState::Idle,
        }
    }
}

impl<T: StreamTransport> Drop for StreamSession<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl StreamSession<HttpTransport> {
    pub fn http(config: herd_foundation::StreamConfig) -> Self {
        Self::new(StreamIngestor::http(config))
    }
}
