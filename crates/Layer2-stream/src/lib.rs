//! # herd-stream
//!
//! Server-Sent-Events 스트림 수집 레이어
//!
//! - [`SseDecoder`]: 임의로 잘린 바이트 청크 → 완성된 [`SseEvent`]
//! - [`StreamIngestor`]: transport 연결, 디코딩, sink 호출, 취소
//! - [`StreamSession`]: 작업 단위로 최대 하나의 스트림 유지
//!
//! ## Example
//!
//! ```ignore
//! use herd_stream::{EventRouter, StreamIngestor, StreamRequest};
//!
//! let ingestor = StreamIngestor::http(Default::default());
//! let sink = EventRouter::new()
//!     .on_message(|e| print!("{}", e.data))
//!     .on("done", |_| println!())
//!     .on_error(|e| eprintln!("{e}"));
//!
//! let handle = ingestor.open(StreamRequest::post(url).body("{}"), sink);
//! handle.finished().await;
//! ```

pub mod decoder;
pub mod error;
pub mod event;
pub mod ingestor;
pub mod session;
pub mod sink;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use decoder::{event_stream, EventStream, SseDecoder, Utf8StreamDecoder};
pub use error::StreamError;
pub use event::{EventKind, SseEvent};
pub use ingestor::{StreamHandle, StreamIngestor, StreamState};
pub use session::{SessionSnapshot, StreamSession};
pub use sink::{ChannelSink, EventRouter, EventSink, NullSink, SinkSignal};
pub use transport::{ByteStream, HttpTransport, StreamRequest, StreamTransport};
