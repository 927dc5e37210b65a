//! Client-side SSE decoding
//!
//! [`FrameSplitter`] reassembles `\n\n`-terminated frames from arbitrarily
//! chunked bytes, keeping any partial frame (including a split UTF-8
//! sequence) until the rest arrives. [`SseDecoder`] interprets the chat frames
//! on top of it.

use tracing::{debug, warn};

use super::StreamFrame;

const FRAME_BOUNDARY: &[u8] = b"\n\n";

/// Largest partial frame held while waiting for its boundary
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Splits a byte stream into complete SSE frames.
///
/// A frame that grows past the size limit without a boundary is dropped, along
/// with the rest of it up to the next boundary.
#[derive(Debug)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a boundary
    scanned: usize,
    max_frame_size: usize,
    discarding: bool,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_frame_size,
            discarding: false,
        }
    }

    /// Append received bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete frame, trimmed, without its terminator
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            // A boundary may straddle the previous scan's last byte
            let start = self.scanned.saturating_sub(FRAME_BOUNDARY.len() - 1);
            let Some(offset) = self.buffer[start..]
                .windows(FRAME_BOUNDARY.len())
                .position(|window| window == FRAME_BOUNDARY)
            else {
                self.scanned = self.buffer.len();
                self.enforce_limit();
                return None;
            };

            let end = start + offset;
            let frame: Vec<u8> = self.buffer.drain(..end + FRAME_BOUNDARY.len()).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            return Some(
                String::from_utf8_lossy(&frame[..end])
                    .trim()
                    .to_string(),
            );
        }
    }

    fn enforce_limit(&mut self) {
        if self.buffer.len() <= self.max_frame_size {
            return;
        }
        if !self.discarding {
            warn!(
                limit = self.max_frame_size,
                "Dropping SSE frame that exceeds the size limit"
            );
        }
        // Keep a trailing newline, it may be half of the next boundary
        let keep = usize::from(self.buffer.last() == Some(&b'\n'));
        self.buffer.drain(..self.buffer.len() - keep);
        self.scanned = self.buffer.len();
        self.discarding = true;
    }

    /// Bytes held back waiting for a boundary
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Payload of a `data:` frame, or `None` for anything else
pub fn data_payload(frame: &str) -> Option<&str> {
    frame.strip_prefix("data:").map(str::trim_start)
}

/// A recognised chat stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Done,
    Error(String),
}

/// Decodes a chat event stream and accumulates the reply.
///
/// Frames that are not `data:` frames, or whose payload is not valid JSON, are
/// logged and skipped. After `done` or `error` every later frame is ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    frames: FrameSplitter,
    reply: String,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the events it completed, in order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.frames.push(chunk);
        while let Some(frame) = self.frames.next_frame() {
            let Some(event) = self.decode_frame(&frame) else {
                continue;
            };
            match &event {
                StreamEvent::Token(token) => self.reply.push_str(token),
                StreamEvent::Done | StreamEvent::Error(_) => self.finished = true,
            }
            events.push(event);
            if self.finished {
                break;
            }
        }

        events
    }

    fn decode_frame(&self, frame: &str) -> Option<StreamEvent> {
        let Some(payload) = data_payload(frame) else {
            debug!(frame = %frame, "Skipping non-data frame");
            return None;
        };

        match serde_json::from_str::<StreamFrame>(payload) {
            Ok(StreamFrame::Token { token }) => Some(StreamEvent::Token(token)),
            Ok(StreamFrame::Done { done: true }) => Some(StreamEvent::Done),
            Ok(StreamFrame::Done { done: false }) => None,
            Ok(StreamFrame::Error { error }) => Some(StreamEvent::Error(error)),
            Err(err) => {
                warn!(error = %err, payload = %payload, "Failed to parse SSE frame");
                None
            }
        }
    }

    /// Reply accumulated from token frames so far
    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn into_reply(self) -> String {
        self.reply
    }

    /// Whether a `done` or `error` frame has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
