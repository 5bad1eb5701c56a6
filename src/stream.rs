//! Ingestion of the streamed response body.
//!
//! The backend answers with `text/event-stream`-looking bytes (`data: ...`
//! followed by a blank line), but chunk boundaries are arbitrary. Two
//! strategies are supported, picked by [`StreamMode`]:
//!
//! * `Replace` strips the framing tokens from whatever arrived in the latest
//!   read and shows only that. Earlier reads are discarded.
//! * `Events` splits the body into discrete events and appends their payloads.
//!   A block without a `data:` line continues the previous payload; the
//!   blank line it was split on is kept, so multi-paragraph deltas survive.

use std::str::FromStr;

use clap::ValueEnum;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Payload the backend may send to mark the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Latest read wins; the assistant message is overwritten on every read.
    #[default]
    Replace,
    /// Event payloads are concatenated across reads.
    Events,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Replace => "replace",
            StreamMode::Events => "events",
        }
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(StreamMode::Replace),
            "events" => Ok(StreamMode::Events),
            other => Err(format!("unknown stream mode '{}' (expected replace or events)", other)),
        }
    }
}

/// Progress of one submission, as reported by the network task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A success response arrived; the assistant message should be created.
    Opened,
    /// New full text for the assistant message.
    Content(String),
    Finished,
    Failed(ChatError),
}

/// Incremental UTF-8 decoder.
///
/// Bytes of a code point split across two chunks are held back until the
/// rest arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    // valid_up_to() guarantees this slice is UTF-8
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush anything still held back. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Remove `data: ` tokens and blank-line separators, then trim.
///
/// This does not parse events; it only strips the tokens.
pub fn strip_framing(buffer: &str) -> String {
    buffer
        .replace("data: ", "")
        .replace("\n\n", "\n")
        .trim()
        .to_string()
}

/// Turns raw body chunks into the text the assistant message should show.
#[derive(Debug)]
pub struct Ingestor {
    mode: StreamMode,
    decoder: Utf8Decoder,
    buffer: String,
    transcript: String,
    in_payload: bool, // last event block carried data that a continuation may extend
}

impl Ingestor {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            transcript: String::new(),
            in_payload: false,
        }
    }

    /// Feed one chunk. Returns the new assistant text if it changed.
    pub fn push(&mut self, chunk: &[u8]) -> Option<String> {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);
        tracing::debug!(mode = self.mode.as_str(), buffer = %self.buffer, "stream chunk");

        match self.mode {
            StreamMode::Replace => self.take_replace(),
            StreamMode::Events => self.drain_events(false),
        }
    }

    /// Signal end of body. Returns the final assistant text if it changed.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.decoder.finish();
        self.buffer.push_str(&rest);

        match self.mode {
            StreamMode::Replace if !rest.is_empty() => self.take_replace(),
            StreamMode::Replace => None,
            StreamMode::Events => self.drain_events(true),
        }
    }

    /// Everything received so far in `Events` mode.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    fn take_replace(&mut self) -> Option<String> {
        let cleaned = strip_framing(&self.buffer);
        self.buffer.clear();
        if cleaned.is_empty() || cleaned == DONE_SENTINEL {
            None
        } else {
            Some(cleaned)
        }
    }

    fn drain_events(&mut self, at_end: bool) -> Option<String> {
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut changed = false;
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            changed |= self.append_event(&block);
        }
        if at_end && !self.buffer.trim().is_empty() {
            let block = std::mem::take(&mut self.buffer);
            changed |= self.append_event(&block);
        }

        if changed {
            Some(self.transcript.clone())
        } else {
            None
        }
    }

    fn append_event(&mut self, block: &str) -> bool {
        match parse_event_block(block) {
            EventBlock::Data(data) if data == DONE_SENTINEL => {
                self.in_payload = false;
                false
            }
            EventBlock::Data(data) => {
                self.in_payload = true;
                if data.is_empty() {
                    return false;
                }
                self.transcript.push_str(&data);
                true
            }
            EventBlock::Continuation(text) => {
                if self.in_payload {
                    self.transcript.push_str("\n\n");
                }
                self.in_payload = true;
                self.transcript.push_str(&text);
                true
            }
            EventBlock::Empty => false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EventBlock {
    /// A block with at least one `data:` line.
    Data(String),
    /// Unprefixed text: the rest of a payload that contained a blank line.
    Continuation(String),
    /// Only comments or other fields.
    Empty,
}

/// Classify one blank-line-terminated block.
///
/// `data:` lines carry the payload. Comments and the other standard fields
/// are skipped. Unprefixed lines are continuations of a multi-line payload,
/// which the backend emits without repeating `data:`.
fn parse_event_block(block: &str) -> EventBlock {
    let mut lines: Vec<&str> = Vec::new();
    let mut has_data = false;
    for line in block.trim_end_matches('\n').split('\n') {
        if let Some(rest) = line.strip_prefix("data:") {
            has_data = true;
            lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.starts_with(':')
            || line.starts_with("event:")
            || line.starts_with("id:")
            || line.starts_with("retry:")
        {
            continue;
        } else if !lines.is_empty() || !line.is_empty() {
            lines.push(line);
        }
    }

    if has_data {
        EventBlock::Data(lines.join("\n"))
    } else if lines.is_empty() {
        EventBlock::Empty
    } else {
        EventBlock::Continuation(lines.join("\n"))
    }
}

/// Drain a body stream, reporting `Content` updates through `emit`.
///
/// The caller reports `Opened` before and `Finished`/`Failed` after; a read
/// error ends ingestion and is returned.
pub async fn ingest<S, B, E, F>(stream: S, mode: StreamMode, emit: &mut F) -> Result<(), ChatError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
    F: FnMut(StreamEvent),
{
    let mut ingestor = Ingestor::new(mode);
    let mut stream = Box::pin(stream);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        if let Some(content) = ingestor.push(chunk.as_ref()) {
            emit(StreamEvent::Content(content));
        }
    }

    if let Some(content) = ingestor.finish() {
        emit(StreamEvent::Content(content));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn push_all(mode: StreamMode, chunks: &[&[u8]]) -> Vec<String> {
        let mut ingestor = Ingestor::new(mode);
        let mut updates: Vec<String> = chunks.iter().filter_map(|c| ingestor.push(c)).collect();
        updates.extend(ingestor.finish());
        updates
    }

    #[test]
    fn test_strip_framing() {
        assert_eq!(strip_framing("data: Hello\n\n"), "Hello");
        assert_eq!(strip_framing("data: a\n\ndata: b\n\n"), "a\nb");
        assert_eq!(strip_framing("\n\n  \n"), "");
    }

    #[test]
    fn test_replace_mode_later_chunk_wins() {
        let updates = push_all(
            StreamMode::Replace,
            &[b"data: Hello\n\n", b"data: Hello World\n\n"],
        );
        assert_eq!(updates, vec!["Hello".to_string(), "Hello World".to_string()]);
    }

    #[test]
    fn test_replace_mode_discards_earlier_deltas() {
        let updates = push_all(StreamMode::Replace, &[b"data: The \n\n", b"data: answer\n\n"]);
        assert_eq!(updates.last().map(String::as_str), Some("answer"));
    }

    #[test]
    fn test_replace_mode_skips_done_and_blank() {
        let updates = push_all(
            StreamMode::Replace,
            &[b"data: Hi\n\n", b"\n\n", b"data: [DONE]\n\n"],
        );
        assert_eq!(updates, vec!["Hi".to_string()]);
    }

    #[test]
    fn test_events_mode_concatenates_deltas() {
        let updates = push_all(
            StreamMode::Events,
            &[b"data: Hello\n\n", b"data:  World\n\n", b"data: [DONE]\n\n"],
        );
        assert_eq!(updates, vec!["Hello".to_string(), "Hello World".to_string()]);
    }

    #[test]
    fn test_events_mode_event_split_across_chunks() {
        let updates = push_all(StreamMode::Events, &[b"da", b"ta: Hel", b"lo\n", b"\n", b"data: !\n\n"]);
        assert_eq!(updates, vec!["Hello".to_string(), "Hello!".to_string()]);
    }

    #[test]
    fn test_events_mode_multiline_payload_and_crlf() {
        let updates = push_all(
            StreamMode::Events,
            &[b"data: line one\r\nline two\r\n\r\n", b": keepalive\n\n"],
        );
        assert_eq!(updates, vec!["line one\nline two".to_string()]);
    }

    #[test]
    fn test_events_mode_flushes_unterminated_tail() {
        let updates = push_all(StreamMode::Events, &[b"data: a\n\n", b"data: b"]);
        assert_eq!(updates, vec!["a".to_string(), "ab".to_string()]);
    }

    #[test]
    fn test_events_mode_keeps_paragraphs_of_one_delta() {
        let body: &[u8] = b"data: ## Answer\n\nFirst paragraph.\n\n- point one\n\n";
        let expected = "## Answer\n\nFirst paragraph.\n\n- point one".to_string();

        assert_eq!(push_all(StreamMode::Events, &[body]), vec![expected.clone()]);

        // same delta cut at arbitrary points
        let updates = push_all(StreamMode::Events, &[&body[..12], &body[12..30], &body[30..]]);
        assert_eq!(updates.last(), Some(&expected));
    }

    #[test]
    fn test_events_mode_paragraphs_then_next_delta() {
        let updates = push_all(
            StreamMode::Events,
            &[b"data: Intro.\n\nMore.\n\n", b"data:  Tail.\n\n", b"data: [DONE]\n\n"],
        );
        assert_eq!(updates.last().map(String::as_str), Some("Intro.\n\nMore. Tail."));
    }

    #[test]
    fn test_events_mode_ignores_fields() {
        let mut ingestor = Ingestor::new(StreamMode::Events);
        assert_eq!(ingestor.push(b"event: delta\nid: 7\ndata: x\n\n"), Some("x".to_string()));
        assert_eq!(ingestor.push(b"retry: 100\n\n"), None);
        assert_eq!(ingestor.transcript(), "x");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "data: héllo ✓\n\n".as_bytes();
        // split inside the two-byte 'é' and the three-byte '✓'
        let e_pos = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let check_pos = bytes.iter().position(|&b| b == 0xE2).unwrap() + 2;

        let mut decoder = Utf8Decoder::new();
        let mut out = decoder.decode(&bytes[..e_pos]);
        assert!(decoder.has_pending());
        out.push_str(&decoder.decode(&bytes[e_pos..check_pos]));
        out.push_str(&decoder.decode(&bytes[check_pos..]));
        assert!(!decoder.has_pending());
        assert_eq!(out, "data: héllo ✓\n\n");
    }

    #[test]
    fn test_utf8_invalid_bytes_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(b"\xE2\x9C"), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_stream_mode_names() {
        assert_eq!("EVENTS".parse::<StreamMode>(), Ok(StreamMode::Events));
        assert_eq!("replace".parse::<StreamMode>(), Ok(StreamMode::Replace));
        assert!("append".parse::<StreamMode>().is_err());
        assert_eq!(StreamMode::default(), StreamMode::Replace);
    }

    #[tokio::test]
    async fn test_ingest_emits_content_updates() {
        let chunks: Vec<Result<&'static [u8], ChatError>> = vec![
            Ok(&b"data: Hello\n\n"[..]),
            Ok(&b"data: Hello World\n\n"[..]),
        ];
        let mut events = Vec::new();
        ingest(stream::iter(chunks), StreamMode::Replace, &mut |ev| events.push(ev))
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("Hello".to_string()),
                StreamEvent::Content("Hello World".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_ingest_stops_on_read_error() {
        let chunks: Vec<Result<&'static [u8], ChatError>> = vec![
            Ok(&b"data: partial\n\n"[..]),
            Err(ChatError::from_transport_message("network connection lost")),
            Ok(&b"data: never seen\n\n"[..]),
        ];
        let mut events = Vec::new();
        let err = ingest(stream::iter(chunks), StreamMode::Replace, &mut |ev| events.push(ev))
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Network);
        assert_eq!(events, vec![StreamEvent::Content("partial".to_string())]);
    }
}
