//! Streaming relay
//!
//! Turns an incremental server-sent-events byte stream from the model
//! provider into an ordered sequence of [`StreamChunk`]s. Byte chunks can
//! split events (and UTF-8 sequences) anywhere; the parser only releases
//! complete events and keeps the remainder buffered.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::AssistantError;

/// One unit delivered to a streaming consumer.
///
/// `Done` and `Error` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamChunk {
    Text(String),
    Done,
    Error(String),
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done | StreamChunk::Error(_))
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

// ============================================================================
// SSE parsing
// ============================================================================

/// Payload of one complete server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` end-of-stream marker
    Done,
    /// More than [`MAX_EVENT_BYTES`] arrived without an event boundary; the
    /// buffered bytes were discarded
    Overflow { buffered: usize },
}

const DONE_MARKER: &str = "[DONE]";

/// Largest single event the parser will buffer
pub const MAX_EVENT_BYTES: usize = 1 << 20;

/// Incremental parser for `text/event-stream` bodies
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a boundary
    scanned: usize,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_boundary(&self.buffer, self.scanned) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.scanned = 0;
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        // keep the last byte unscanned: a boundary may straddle two pushes
        self.scanned = self.buffer.len().saturating_sub(1);

        if self.buffer.len() > MAX_EVENT_BYTES {
            let buffered = self.buffer.len();
            tracing::warn!(buffered, limit = MAX_EVENT_BYTES, "SSE event too large, discarding");
            self.buffer.clear();
            self.scanned = 0;
            events.push(SseEvent::Overflow { buffered });
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        parse_block(&rest).into_iter().collect()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find_boundary(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| pos + from)
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();
    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload.trim() == DONE_MARKER {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(payload))
    }
}

// ============================================================================
// Chunk streams
// ============================================================================

/// Decodes one provider `data:` payload.
///
/// `Ok(None)` means the event carried no text (role announcements, finish
/// markers); `Err` ends the stream with an error chunk.
pub type PayloadDecoder = fn(&str) -> Result<Option<String>, String>;

struct SseState<S> {
    body: Pin<Box<S>>,
    parser: SseParser,
    decode: PayloadDecoder,
    pending: VecDeque<StreamChunk>,
    terminated: bool,
    finished: bool,
}

impl<S> SseState<S> {
    fn enqueue(&mut self, chunk: StreamChunk) {
        if self.terminated {
            return;
        }
        self.terminated = chunk.is_terminal();
        self.pending.push_back(chunk);
    }

    fn enqueue_events(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Done => self.enqueue(StreamChunk::Done),
                SseEvent::Overflow { buffered } => self.enqueue(StreamChunk::Error(format!(
                    "stream event exceeded {} bytes ({} buffered)",
                    MAX_EVENT_BYTES, buffered
                ))),
                SseEvent::Data(payload) => match (self.decode)(&payload) {
                    Ok(Some(text)) if !text.is_empty() => self.enqueue(StreamChunk::Text(text)),
                    Ok(_) => {}
                    Err(message) => self.enqueue(StreamChunk::Error(message)),
                },
            }
        }
    }
}

/// Parse an SSE byte stream into chunks.
///
/// A body that ends without the `[DONE]` marker still yields `Done`; a
/// transport failure yields `Error`.
pub fn sse_chunks<S, B, E>(body: S, decode: PayloadDecoder) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        parser: SseParser::new(),
        decode,
        pending: VecDeque::new(),
        terminated: false,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                if chunk.is_terminal() {
                    st.finished = true;
                }
                return Some((chunk, st));
            }
            if st.finished || st.terminated {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let events = st.parser.push(bytes.as_ref());
                    st.enqueue_events(events);
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "Model stream transport failed");
                    st.enqueue(StreamChunk::Error(err.to_string()));
                }
                None => {
                    let events = st.parser.finish();
                    st.enqueue_events(events);
                    st.enqueue(StreamChunk::Done);
                }
            }
        }
    }))
}

/// Pass chunks through until the first terminal one.
///
/// Guarantees the consumer sees exactly one terminal chunk, appending
/// `Done` when the source ends without one.
pub fn relay(source: ChunkStream) -> ChunkStream {
    Box::pin(stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next().await {
            Some(chunk) if chunk.is_terminal() => Some((chunk, None)),
            Some(chunk) => Some((chunk, Some(source))),
            None => Some((StreamChunk::Done, None)),
        }
    }))
}

/// End the stream with an error chunk once `limit` has elapsed
pub fn with_deadline(source: ChunkStream, limit: Duration) -> ChunkStream {
    let deadline = Instant::now() + limit;
    Box::pin(stream::unfold(Some(source), move |state| async move {
        let mut source = state?;
        match tokio::time::timeout_at(deadline, source.next()).await {
            Ok(Some(chunk)) if chunk.is_terminal() => Some((chunk, None)),
            Ok(Some(chunk)) => Some((chunk, Some(source))),
            Ok(None) => None,
            Err(_) => {
                let err = AssistantError::DeadlineExceeded(limit);
                tracing::warn!(error = %err, "Stream cancelled");
                Some((StreamChunk::Error(err.to_string()), None))
            }
        }
    }))
}

/// A complete answer delivered as one text chunk followed by `Done`
pub fn single_answer(text: impl Into<String>) -> ChunkStream {
    Box::pin(stream::iter(vec![
        StreamChunk::Text(text.into()),
        StreamChunk::Done,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn text_payload(payload: &str) -> Result<Option<String>, String> {
        let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        Ok(value["text"].as_str().map(str::to_string))
    }

    fn body(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Send {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[test]
    fn test_parser_rebuffers_partial_event() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"text\":").is_empty());
        assert!(parser.buffered() > 0);

        let events = parser.push(b"\"hi\"}\n\ndata: [DO");
        assert_eq!(events, vec![SseEvent::Data("{\"text\":\"hi\"}".into())]);

        let events = parser.push(b"NE]\n\n");
        assert_eq!(events, vec![SseEvent::Done]);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_parser_finds_boundary_split_across_pushes() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: a\n").is_empty());
        let events = parser.push(b"\ndata: b\n\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("a".into()), SseEvent::Data("b".into())]
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_parser_caps_unterminated_event() {
        let mut parser = SseParser::new();
        let mut events = parser.push(b"data: {\"text\":\"ok\"}\n\n");
        let filler = vec![b'x'; 64 * 1024];
        for _ in 0..=(MAX_EVENT_BYTES / filler.len()) {
            events.extend(parser.push(&filler));
        }
        assert_eq!(events[0], SseEvent::Data("{\"text\":\"ok\"}".into()));
        assert!(matches!(events.last(), Some(SseEvent::Overflow { .. })));
        assert!(parser.buffered() <= MAX_EVENT_BYTES);
    }

    #[test]
    fn test_parser_handles_crlf_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\r\n\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("a\nb".into())]);
    }

    #[tokio::test]
    async fn test_split_multibyte_chunks_arrive_in_order() {
        let raw = "data: {\"text\":\"Hé\"}\n\ndata: {\"text\":\"llo \"}\n\ndata: {\"text\":\"wörld\"}\n\ndata: [DONE]\n\n";
        let bytes = raw.as_bytes();
        // split inside the two-byte 'é'
        let split = raw.find('é').unwrap() + 1;
        let parts = vec![
            bytes[..split].to_vec(),
            bytes[split..split + 7].to_vec(),
            bytes[split + 7..].to_vec(),
        ];

        let chunks: Vec<StreamChunk> = sse_chunks(body(parts), text_payload).collect().await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text("Hé".into()),
                StreamChunk::Text("llo ".into()),
                StreamChunk::Text("wörld".into()),
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_done_marker_still_terminates() {
        let parts = vec![b"data: {\"text\":\"partial\"}".to_vec()];
        let chunks: Vec<StreamChunk> = sse_chunks(body(parts), text_payload).collect().await;
        assert_eq!(
            chunks,
            vec![StreamChunk::Text("partial".into()), StreamChunk::Done]
        );
    }

    #[tokio::test]
    async fn test_decode_error_is_terminal() {
        let parts = vec![b"data: not json\n\ndata: {\"text\":\"late\"}\n\n".to_vec()];
        let chunks: Vec<StreamChunk> = sse_chunks(body(parts), text_payload).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], StreamChunk::Error(_)));
    }

    #[tokio::test]
    async fn test_relay_stops_after_terminal() {
        let source: ChunkStream = Box::pin(stream::iter(vec![
            StreamChunk::Text("a".into()),
            StreamChunk::Error("boom".into()),
            StreamChunk::Text("ignored".into()),
        ]));
        let chunks: Vec<StreamChunk> = relay(source).collect().await;
        assert_eq!(
            chunks,
            vec![StreamChunk::Text("a".into()), StreamChunk::Error("boom".into())]
        );

        let open: ChunkStream = Box::pin(stream::iter(vec![StreamChunk::Text("b".into())]));
        let chunks: Vec<StreamChunk> = relay(open).collect().await;
        assert_eq!(chunks.last(), Some(&StreamChunk::Done));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_stalled_stream() {
        let stalled: ChunkStream = Box::pin(
            stream::iter(vec![StreamChunk::Text("partial".into())]).chain(stream::pending()),
        );
        let chunks: Vec<StreamChunk> = with_deadline(stalled, Duration::from_secs(5))
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], StreamChunk::Text("partial".into()));
        assert!(matches!(&chunks[1], StreamChunk::Error(msg) if msg.contains("deadline")));
    }

    #[tokio::test]
    async fn test_single_answer() {
        let chunks: Vec<StreamChunk> = single_answer("42 orders").collect().await;
        assert_eq!(
            chunks,
            vec![StreamChunk::Text("42 orders".into()), StreamChunk::Done]
        );
    }
}
