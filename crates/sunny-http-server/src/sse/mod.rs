//! Server-Sent Events (SSE) support
//!
//! Wire format: every event is one frame, `data: <json>\n\n`. A chat stream is
//! a run of `{"token": ...}` frames ending in either `{"done": true}` or
//! `{"error": ...}`, or in the connection closing.

pub mod decoder;

pub use decoder::{FrameSplitter, SseDecoder, StreamEvent, data_payload};

use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::{Response, ResponseError};

/// Payload of one chat stream frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Token { token: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamFrame {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

/// Set the event-stream headers and flush them so the client can start
/// framing before the first event
pub fn open(res: &mut Response) -> Result<(), ResponseError> {
    res.set_header(CONTENT_TYPE, "text/event-stream")
        .set_header(CACHE_CONTROL, "no-cache")
        .set_header(CONNECTION, "keep-alive");
    res.flush_headers()
}

/// Format a payload as one frame
pub fn format_frame<T: Serialize + ?Sized>(payload: &T) -> Result<String, ResponseError> {
    Ok(format!("data: {}\n\n", serde_json::to_string(payload)?))
}

/// Write one frame
pub async fn send<T: Serialize + ?Sized>(
    res: &mut Response,
    payload: &T,
) -> Result<(), ResponseError> {
    let frame = format_frame(payload)?;
    res.write(frame).await
}

/// End the stream; nothing may be written afterwards
pub fn close(res: &mut Response) {
    res.finish();
}
