//! Byte-level STOMP frame parser.
//!
//! # Responsibilities
//! - Decode a STOMP-framed byte/text stream into discrete frames
//! - Emit heartbeat (bare LF) events between frames
//! - Survive subscriber panics without corrupting parser state
//!
//! # Design Decisions
//! - Explicit state enum with a single match dispatch per byte; a state
//!   transition may reprocess the same byte without consuming a new one
//! - Best-effort: malformed input misparses rather than erroring, so a
//!   bad frame never kills the stream it was observed on
//! - Transport-independent: callers feed whatever bytes they have, at
//!   arbitrary chunk boundaries

use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::Bytes;

const NULL: u8 = 0x00;
const LF: u8 = 0x0a;
const CR: u8 = 0x0d;
const COLON: u8 = 0x3a;

/// One decoded STOMP frame.
///
/// Headers keep declaration order and duplicates; the body is raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: Option<String>,
    pub headers: Vec<(String, String)>,
    pub binary_body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CollectFrame,
    CollectCommand,
    CollectHeaders,
    CollectHeaderKey,
    CollectHeaderValue,
    CollectBodyFixedSize,
    CollectBodyNullTerminated,
}

type FrameCallback = Box<dyn Fn(&StompFrame) + Send>;
type PingCallback = Box<dyn Fn() + Send>;

/// Streaming STOMP parser; one instance per traffic direction.
pub struct StompParser {
    state: State,
    token: Vec<u8>,
    command: Option<String>,
    headers: Vec<(String, String)>,
    header_key: Option<String>,
    body_bytes_remaining: usize,
    frame_subscribers: Vec<FrameCallback>,
    ping_subscribers: Vec<PingCallback>,
}

impl Default for StompParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StompParser {
    pub fn new() -> Self {
        Self {
            state: State::CollectFrame,
            token: Vec::new(),
            command: None,
            headers: Vec::new(),
            header_key: None,
            body_bytes_remaining: 0,
            frame_subscribers: Vec::new(),
            ping_subscribers: Vec::new(),
        }
    }

    /// Register a completed-frame callback.
    pub fn on_frame(&mut self, cb: impl Fn(&StompFrame) + Send + 'static) {
        self.frame_subscribers.push(Box::new(cb));
    }

    /// Register a heartbeat callback.
    pub fn on_ping(&mut self, cb: impl Fn() + Send + 'static) {
        self.ping_subscribers.push(Box::new(cb));
    }

    /// Feed a text segment; encoded to bytes before the byte machine runs.
    pub fn parse_text(&mut self, segment: &str) {
        self.parse_chunk(segment.as_bytes());
    }

    /// Feed a binary segment at an arbitrary chunk boundary.
    pub fn parse_chunk(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.on_byte(byte);
        }
    }

    /// Decode body bytes for display, lossily when not valid UTF-8.
    pub fn decode_text(data: &[u8]) -> String {
        String::from_utf8_lossy(data).into_owned()
    }

    fn on_byte(&mut self, byte: u8) {
        // Loop rather than recurse: a non-consuming transition re-injects
        // the same byte into the new state.
        loop {
            match self.state {
                State::CollectFrame => {
                    if byte == NULL || byte == CR {
                        return;
                    }
                    if byte == LF {
                        self.emit_ping();
                        return;
                    }
                    self.state = State::CollectCommand;
                    continue;
                }
                State::CollectCommand => {
                    if byte == CR {
                        return;
                    }
                    if byte == LF {
                        self.command = Some(self.consume_token_as_utf8());
                        self.state = State::CollectHeaders;
                        return;
                    }
                    self.token.push(byte);
                    return;
                }
                State::CollectHeaders => {
                    if byte == CR {
                        return;
                    }
                    if byte == LF {
                        self.setup_collect_body();
                        return;
                    }
                    self.state = State::CollectHeaderKey;
                    continue;
                }
                State::CollectHeaderKey => {
                    if byte == COLON {
                        self.header_key = Some(self.consume_token_as_utf8());
                        self.state = State::CollectHeaderValue;
                        return;
                    }
                    self.token.push(byte);
                    return;
                }
                State::CollectHeaderValue => {
                    if byte == CR {
                        return;
                    }
                    if byte == LF {
                        let value = self.consume_token_as_utf8();
                        let key = self.header_key.take().unwrap_or_default();
                        self.headers.push((key, value));
                        self.state = State::CollectHeaders;
                        return;
                    }
                    self.token.push(byte);
                    return;
                }
                State::CollectBodyFixedSize => {
                    // The check happens before consuming the current byte, so
                    // the byte seen once the counter is spent (the trailing
                    // NULL terminator) is discarded, never appended.
                    if self.body_bytes_remaining == 0 {
                        self.retrieved_body();
                        return;
                    }
                    self.body_bytes_remaining -= 1;
                    self.token.push(byte);
                    return;
                }
                State::CollectBodyNullTerminated => {
                    if byte == NULL {
                        self.retrieved_body();
                        return;
                    }
                    self.token.push(byte);
                    return;
                }
            }
        }
    }

    fn setup_collect_body(&mut self) {
        let content_length = self
            .headers
            .iter()
            .find(|(key, _)| key == "content-length")
            .and_then(|(_, value)| value.trim().parse::<usize>().ok());

        match content_length {
            Some(length) => {
                self.body_bytes_remaining = length;
                self.state = State::CollectBodyFixedSize;
            }
            None => self.state = State::CollectBodyNullTerminated,
        }
    }

    fn retrieved_body(&mut self) {
        let frame = StompFrame {
            command: self.command.take(),
            headers: std::mem::take(&mut self.headers),
            binary_body: Bytes::from(std::mem::take(&mut self.token)),
        };

        for cb in &self.frame_subscribers {
            if catch_unwind(AssertUnwindSafe(|| cb(&frame))).is_err() {
                tracing::warn!("Ignoring a panic thrown by a frame subscriber");
            }
        }

        self.reset();
    }

    fn emit_ping(&mut self) {
        for cb in &self.ping_subscribers {
            if catch_unwind(AssertUnwindSafe(|| cb())).is_err() {
                tracing::warn!("Ignoring a panic thrown by a ping subscriber");
            }
        }
    }

    fn consume_token_as_utf8(&mut self) -> String {
        let raw = std::mem::take(&mut self.token);
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn reset(&mut self) {
        self.command = None;
        self.headers = Vec::new();
        self.header_key = None;
        self.token = Vec::new();
        self.body_bytes_remaining = 0;
        self.state = State::CollectFrame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn collect_frames(parser: &mut StompParser) -> Arc<Mutex<Vec<StompFrame>>> {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        parser.on_frame(move |frame| sink.lock().unwrap().push(frame.clone()));
        frames
    }

    #[test]
    fn parses_a_frame_fed_byte_by_byte() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        for byte in b"COMMAND\nheader1:value1\n\nBODY\0" {
            parser.parse_chunk(&[*byte]);
        }

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command.as_deref(), Some("COMMAND"));
        assert_eq!(
            frames[0].headers,
            vec![("header1".to_string(), "value1".to_string())]
        );
        assert_eq!(&frames[0].binary_body[..], b"BODY");
    }

    #[test]
    fn fixed_size_body_keeps_embedded_nulls_and_drops_the_terminator() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"SEND\ncontent-length:4\n\nAB\0D\0");

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].binary_body[..], b"AB\0D");
    }

    #[test]
    fn fixed_size_body_without_nulls() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"SEND\ncontent-length:4\n\nABCD\0");

        assert_eq!(&frames.lock().unwrap()[0].binary_body[..], b"ABCD");
    }

    #[test]
    fn carriage_returns_are_ignored_everywhere() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"CONNECT\r\nhost:example\r\n\r\n\0");

        let frames = frames.lock().unwrap();
        assert_eq!(frames[0].command.as_deref(), Some("CONNECT"));
        assert_eq!(
            frames[0].headers,
            vec![("host".to_string(), "example".to_string())]
        );
        assert!(frames[0].binary_body.is_empty());
    }

    #[test]
    fn duplicate_headers_preserve_order() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        parser.parse_text("MESSAGE\nfoo:1\nfoo:2\nbar:3\n\n\0");

        assert_eq!(
            frames.lock().unwrap()[0].headers,
            vec![
                ("foo".to_string(), "1".to_string()),
                ("foo".to_string(), "2".to_string()),
                ("bar".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn bare_linefeeds_are_heartbeats() {
        let mut parser = StompParser::new();
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pings);
        parser.on_ping(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"\n\nPING-LESS\n\nbody\0\n");

        assert_eq!(pings.load(Ordering::SeqCst), 3);
        assert_eq!(frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut parser = StompParser::new();
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"A\n\none\0B\n\ntwo\0");

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command.as_deref(), Some("A"));
        assert_eq!(&frames[1].binary_body[..], b"two");
    }

    #[test]
    fn panicking_subscriber_does_not_corrupt_the_parser() {
        let mut parser = StompParser::new();
        parser.on_frame(|_| panic!("inspector bug"));
        let frames = collect_frames(&mut parser);

        parser.parse_chunk(b"A\n\nfirst\0");
        parser.parse_chunk(b"B\n\nsecond\0");

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command.as_deref(), Some("B"));
    }

    #[test]
    fn decode_text_is_lossy_on_invalid_utf8() {
        assert_eq!(StompParser::decode_text(b"plain"), "plain");
        assert_eq!(StompParser::decode_text(&[0xff, 0xfe]), "\u{fffd}\u{fffd}");
    }
}
