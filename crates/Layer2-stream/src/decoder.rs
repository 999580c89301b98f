//! Incremental SSE decoding
//!
//! 바이트 청크는 임의의 위치(줄 중간, 멀티바이트 문자 중간)에서 잘려 도착합니다.
//! 두 단계로 처리합니다:
//!
//! 1. [`Utf8StreamDecoder`] - 청크 경계에 걸친 UTF-8 시퀀스를 다음 청크까지 보류
//! 2. [`SseDecoder`] - 빈 줄(`\n\n`)로 끝나는 이벤트 블록을 잘라 [`SseEvent`]로 변환
//!
//! Field rules:
//! - `event:` value is trimmed
//! - `data:` loses one leading space and a trailing `\r`; multiple data lines
//!   are concatenated with no separator
//! - `id:` is kept, `retry:` and `:` comments are ignored
//! - a block with neither `event:` nor `data:` is not an event
//! - an unterminated trailing block is dropped when the body ends

use crate::error::StreamError;
use crate::event::{EventKind, SseEvent};
use crate::transport::ByteStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// UTF-8 decoder that tolerates sequences split across chunks
///
/// Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, holding back an incomplete trailing sequence
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Bytes held back waiting for the rest of a sequence
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Flush at end of input; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Push-based SSE framer
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8StreamDecoder,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk
    pub fn feed(&mut self, chunk: &[u8]) {
        let text = self.utf8.decode(chunk);
        let normalize = text.contains('\r') || self.buffer.ends_with('\r');
        self.buffer.push_str(&text);
        if normalize {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    /// Take the next complete event out of the buffer
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&block[..end]) {
                return Some(event);
            }
        }
        None
    }

    /// Feed a chunk and collect every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.feed(chunk);
        std::iter::from_fn(|| self.next_event()).collect()
    }

    /// Text received after the last complete event
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// End of input: returns whatever partial block is discarded
    pub fn finish(&mut self) -> String {
        let tail = self.utf8.finish();
        self.buffer.push_str(&tail);
        std::mem::take(&mut self.buffer)
    }
}

/// Parse one event block (without its terminating blank line)
pub fn parse_block(block: &str) -> Option<SseEvent> {
    let mut kind: Option<EventKind> = None;
    let mut data: Option<String> = None;
    let mut id = None;

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value),
            None => (line, ""),
        };

        match field {
            "event" => kind = Some(EventKind::from_field(value)),
            "data" => {
                let value = value.strip_prefix(' ').unwrap_or(value);
                data.get_or_insert_with(String::new).push_str(value);
            }
            "id" => id = Some(value.strip_prefix(' ').unwrap_or(value).to_string()),
            _ => {}
        }
    }

    if kind.is_none() && data.is_none() {
        return None;
    }

    Some(SseEvent {
        kind: kind.unwrap_or_default(),
        data: data.unwrap_or_default(),
        id,
    })
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, StreamError>> + Send>>;

/// Turn a body byte stream into a stream of events
///
/// Events completed by one chunk are yielded before the next chunk is read.
/// A read error is yielded once and ends the stream.
pub fn event_stream(mut bytes: ByteStream) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    decoder.feed(&chunk);
                    while let Some(event) = decoder.next_event() {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        let leftover = decoder.finish();
        if !leftover.is_empty() {
            tracing::trace!(bytes = leftover.len(), "Discarding unterminated trailing event");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        chunks.iter().flat_map(|c| decoder.push(c)).collect()
    }

    // ========================================================================
    // UTF-8
    // ========================================================================

    #[test]
    fn test_utf8_split_multibyte() {
        let text = "염소 🐐";
        let bytes = text.as_bytes();
        let mut decoder = Utf8StreamDecoder::new();

        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, text);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_utf8_invalid_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_utf8_dangling_sequence_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    // ========================================================================
    // Framing
    // ========================================================================

    #[test]
    fn test_single_message() {
        let events = decode_all(&[b"data: hello\n\n"]);
        assert_eq!(events, vec![SseEvent::message("hello")]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let events = decode_all(&[b"data: a\n\nevent: done\ndata: {}\n\n"]);
        assert_eq!(
            events,
            vec![SseEvent::message("a"), SseEvent::named("done", "{}")]
        );
    }

    #[test]
    fn test_chunk_split_mid_line() {
        let events = decode_all(&[b"da", b"ta: hel", b"lo\n", b"\nda", b"ta: x\n\n"]);
        assert_eq!(events, vec![SseEvent::message("hello"), SseEvent::message("x")]);
    }

    #[test]
    fn test_chunk_split_mid_codepoint() {
        let payload = "data: 추천 결과\n\n".as_bytes();
        // Split inside the first Hangul syllable
        let (a, b) = payload.split_at(7);
        let events = decode_all(&[a, b]);
        assert_eq!(events, vec![SseEvent::message("추천 결과")]);
    }

    #[test]
    fn test_every_split_point_yields_same_events() {
        let payload = "event: chunk\ndata: 한글\n\ndata: second\n\n".as_bytes();
        let expected = decode_all(&[payload]);
        assert_eq!(expected.len(), 2);

        for split in 1..payload.len() {
            let (a, b) = payload.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at {split}");
        }
    }

    #[test]
    fn test_multi_line_data_concatenated() {
        let events = decode_all(&[b"data: {\"a\":\ndata: 1}\n\n"]);
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let events = decode_all(&[b"data:  two\ndata:none\n\n"]);
        assert_eq!(events[0].data, " twonone");
    }

    #[test]
    fn test_event_name_trimmed() {
        let events = decode_all(&[b"event:   error  \ndata: boom\n\n"]);
        assert_eq!(events[0].kind, EventKind::Named("error".into()));
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = decode_all(&[b"event: done\r\ndata: ok\r", b"\n\r\n"]);
        assert_eq!(events, vec![SseEvent::named("done", "ok")]);
    }

    #[test]
    fn test_comments_and_keepalives_skipped() {
        let events = decode_all(&[b": ping\n\n\n\nretry: 100\n\ndata: real\n\n"]);
        assert_eq!(events, vec![SseEvent::message("real")]);
    }

    #[test]
    fn test_event_without_data() {
        let events = decode_all(&[b"event: done\n\n"]);
        assert_eq!(events, vec![SseEvent::named("done", "")]);
    }

    #[test]
    fn test_id_field_kept() {
        let events = decode_all(&[b"id: 7\ndata: x\n\n"]);
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_trailing_partial_event_dropped() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: one\n\ndata: unfinished"), vec![SseEvent::message("one")]);
        assert_eq!(decoder.buffered(), "data: unfinished");
        assert_eq!(decoder.finish(), "data: unfinished");
        assert_eq!(decoder.buffered(), "");
    }

    // ========================================================================
    // Stream adapter
    // ========================================================================

    #[tokio::test]
    async fn test_event_stream() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"data: a\n")),
            Ok(Bytes::from_static(b"\ndata: b\n\ndata: c")),
        ];
        let events: Vec<_> = event_stream(Box::pin(futures::stream::iter(chunks)))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![Ok(SseEvent::message("a")), Ok(SseEvent::message("b"))]
        );
    }

    #[tokio::test]
    async fn test_event_stream_read_error_ends_stream() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(StreamError::Read("reset".into())),
            Ok(Bytes::from_static(b"data: never\n\n")),
        ];
        let events: Vec<_> = event_stream(Box::pin(futures::stream::iter(chunks)))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                Ok(SseEvent::message("a")),
                Err(StreamError::Read("reset".into()))
            ]
        );
    }
}
