//! Event sinks
//!
//! 스트림 세션은 세 종류의 신호를 보냅니다: 이벤트, 에러, 정상 종료.
//! - [`EventSink`]: 콜백 trait (세션 태스크에서 동기적으로 호출)
//! - [`SinkSignal`]: 같은 신호의 태그 enum 형태
//! - [`ChannelSink`]: 신호를 tokio mpsc 채널로 전달
//! - [`EventRouter`]: 이벤트 타입별 핸들러 등록

use crate::error::StreamError;
use crate::event::{EventKind, SseEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Receiver of one session's signals
///
/// After `on_error` or `on_close` nothing else is delivered.
pub trait EventSink: Send {
    fn on_event(&mut self, event: SseEvent);

    fn on_error(&mut self, error: StreamError);

    fn on_close(&mut self);

    /// Deliver a tagged signal
    fn signal(&mut self, signal: SinkSignal) {
        match signal {
            SinkSignal::Event(event) => self.on_event(event),
            SinkSignal::Error(error) => self.on_error(error),
            SinkSignal::Closed => self.on_close(),
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn on_event(&mut self, event: SseEvent) {
        (**self).on_event(event)
    }

    fn on_error(&mut self, error: StreamError) {
        (**self).on_error(error)
    }

    fn on_close(&mut self) {
        (**self).on_close()
    }
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: SseEvent) {}
    fn on_error(&mut self, _error: StreamError) {}
    fn on_close(&mut self) {}
}

// ============================================================================
// SinkSignal / ChannelSink
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSignal {
    Event(SseEvent),
    Error(StreamError),
    Closed,
}

impl SinkSignal {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SinkSignal::Event(_))
    }
}

/// Forwards signals into an unbounded channel
///
/// A dropped receiver is not an error; signals are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkSignal>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, signal: SinkSignal) {
        if self.tx.send(signal).is_err() {
            tracing::trace!("Signal receiver dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_event(&mut self, event: SseEvent) {
        self.send(SinkSignal::Event(event));
    }

    fn on_error(&mut self, error: StreamError) {
        self.send(SinkSignal::Error(error));
    }

    fn on_close(&mut self) {
        self.send(SinkSignal::Closed);
    }
}

// ============================================================================
// EventRouter
// ============================================================================

type EventHandler = Box<dyn FnMut(&SseEvent) + Send>;
type ErrorHandler = Box<dyn FnMut(&StreamError) + Send>;
type CloseHandler = Box<dyn FnMut() + Send>;

/// Dispatches events to handlers registered per event type
///
/// Unnamed events go to the `message` handler. Types with no handler go
/// to the fallback; with no fallback they are logged and dropped.
#[derive(Default)]
pub struct EventRouter {
    message: Option<EventHandler>,
    named: HashMap<String, EventHandler>,
    fallback: Option<EventHandler>,
    error: Option<ErrorHandler>,
    close: Option<CloseHandler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message(mut self, handler: impl FnMut(&SseEvent) + Send + 'static) -> Self {
        self.message = Some(Box::new(handler));
        self
    }

    /// Handler for one event type; `"message"` is the same as [`on_message`](Self::on_message)
    pub fn on(mut self, event_type: &str, handler: impl FnMut(&SseEvent) + Send + 'static) -> Self {
        match EventKind::from_field(event_type) {
            EventKind::Message => self.message = Some(Box::new(handler)),
            EventKind::Named(name) => {
                self.named.insert(name, Box::new(handler));
            }
        }
        self
    }

    pub fn fallback(mut self, handler: impl FnMut(&SseEvent) + Send + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(&StreamError) + Send + 'static) -> Self {
        self.error = Some(Box::new(handler));
        self
    }

    pub fn on_close(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.close = Some(Box::new(handler));
        self
    }

    fn handler_for(&mut self, kind: &EventKind) -> Option<&mut EventHandler> {
        let specific = match kind {
            EventKind::Message => self.message.as_mut(),
            EventKind::Named(name) => self.named.get_mut(name),
        };
        specific.or(self.fallback.as_mut())
    }
}

impl EventSink for EventRouter {
    fn on_event(&mut self, event: SseEvent) {
        match self.handler_for(&event.kind) {
            Some(handler) => handler(&event),
            None => tracing::debug!(event_type = %event.kind, "No handler for event"),
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if let Some(handler) = self.error.as_mut() {
            handler(&error);
        }
    }

    fn on_close(&mut self) {
        if let Some(handler) = self.close.as_mut() {
            handler();
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut named: Vec<&String> = self.named.keys().collect();
        named.sort();
        f.debug_struct("EventRouter")
            .field("message", &self.message.is_some())
            .field("named", &named)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> EventHandler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &str| -> EventHandler {
                let log = Arc::clone(&log);
                let tag = tag.to_string();
                Box::new(move |event: &SseEvent| log.lock().push(format!("{tag}:{}", event.data)))
            }
        };
        (log, make)
    }

    #[test]
    fn test_router_dispatch() {
        let (log, make) = recorder();
        let mut router = EventRouter::new()
            .on_message(make("msg"))
            .on("done", make("done"))
            .fallback(make("other"));

        router.on_event(SseEvent::message("a"));
        router.on_event(SseEvent::named("done", "b"));
        router.on_event(SseEvent::named("progress", "c"));

        assert_eq!(*log.lock(), vec!["msg:a", "done:b", "other:c"]);
    }

    #[test]
    fn test_router_on_message_alias() {
        let (log, make) = recorder();
        let mut router = EventRouter::new().on("message", make("m"));
        router.on_event(SseEvent::message("x"));
        assert_eq!(*log.lock(), vec!["m:x"]);
    }

    #[test]
    fn test_router_unrouted_without_fallback() {
        let (log, make) = recorder();
        let mut router = EventRouter::new().on("done", make("done"));
        router.on_event(SseEvent::message("ignored"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_router_error_and_close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
        let mut router = EventRouter::new()
            .on_error(move |e| l1.lock().push(e.to_string()))
            .on_close(move || l2.lock().push("closed".to_string()));

        router.signal(SinkSignal::Error(StreamError::Read("reset".into())));
        router.signal(SinkSignal::Closed);

        assert_eq!(*log.lock(), vec!["Stream read failed: reset", "closed"]);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.on_event(SseEvent::message("hi"));
        sink.on_close();

        assert_eq!(rx.recv().await, Some(SinkSignal::Event(SseEvent::message("hi"))));
        let last = rx.recv().await.unwrap();
        assert!(last.is_terminal());
        assert_eq!(last, SinkSignal::Closed);
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_event(SseEvent::message("lost"));
    }
}
