//! Response surface
//!
//! A [`Response`] is owned by one connection and mutated only by the handler
//! currently running. Status, headers and cookies are buffered until the head
//! is sent; the head goes out either together with a complete body (`json`,
//! `text`, `end`) or on its own when the response switches to streaming
//! (`flush_headers`, `write`), after which body chunks flow through a channel.

use std::convert::Infallible;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, IntoHeaderName, SET_COOKIE};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::cookie::{self, CookieOptions};

/// Outbound body type handed to hyper
pub type ResponseBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// Receiving side of a response: resolves once the head has been sent
pub type PendingResponse = oneshot::Receiver<hyper::Response<ResponseBody>>;

/// Chunks buffered between a streaming handler and the connection
const STREAM_BUFFER: usize = 32;

/// Response surface contract violations
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Response body already written")]
    BodyAlreadyWritten,

    #[error("Response headers already sent")]
    HeadersAlreadySent,

    #[error("Client disconnected")]
    Disconnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

enum BodyState {
    /// Nothing sent yet
    Pending,
    /// Head sent, chunks flow through the channel
    Streaming(mpsc::Sender<Bytes>),
    /// Complete; no further writes
    Ended,
}

/// Outbound response with chainable setters
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    state: BodyState,
    head_tx: Option<oneshot::Sender<hyper::Response<ResponseBody>>>,
}

impl Response {
    /// Create a response and the receiver the connection waits on
    pub fn channel() -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        (
            Self {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                state: BodyState::Pending,
                head_tx: Some(head_tx),
            },
            head_rx,
        )
    }

    /// Set the status code
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        if self.headers_sent() {
            warn!(%status, "Ignoring status change after headers were sent");
        } else {
            self.status = status;
        }
        self
    }

    /// Set a header, replacing any previous value. Invalid values are dropped.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        K: IntoHeaderName,
        V: TryInto<HeaderValue>,
    {
        if self.headers_sent() {
            warn!("Ignoring header change after headers were sent");
            return self;
        }
        match value.try_into() {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => warn!("Dropping invalid header value"),
        }
        self
    }

    /// Append a `Set-Cookie` header; repeated calls accumulate
    pub fn cookie(&mut self, name: &str, value: &str, options: &CookieOptions) -> &mut Self {
        if self.headers_sent() {
            warn!(cookie = name, "Ignoring cookie set after headers were sent");
            return self;
        }
        match HeaderValue::try_from(cookie::encode(name, value, options)) {
            Ok(header) => {
                self.headers.append(SET_COOKIE, header);
            }
            Err(_) => warn!(cookie = name, "Dropping unencodable cookie"),
        }
        self
    }

    /// Serialize `payload` as JSON and end the response
    pub fn json<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<(), ResponseError> {
        self.ensure_pending()?;
        let body = serde_json::to_vec(payload)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send_complete(Bytes::from(body))
    }

    /// End the response with a raw string body. `Content-Type` is left to the caller.
    pub fn text(&mut self, body: impl Into<String>) -> Result<(), ResponseError> {
        self.ensure_pending()?;
        self.send_complete(Bytes::from(body.into()))
    }

    /// End the response with an empty body
    pub fn end(&mut self) -> Result<(), ResponseError> {
        match self.state {
            BodyState::Pending => self.send_complete(Bytes::new()),
            BodyState::Streaming(_) => {
                self.finish();
                Ok(())
            }
            BodyState::Ended => Err(ResponseError::BodyAlreadyWritten),
        }
    }

    /// Send the head now and switch to streaming mode
    pub fn flush_headers(&mut self) -> Result<(), ResponseError> {
        self.ensure_pending()?;

        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);
        let stream = ReceiverStream::new(rx).map(|chunk| Ok::<_, hyper::Error>(Frame::data(chunk)));
        self.send_head(StreamBody::new(stream).boxed_unsync())?;
        self.state = BodyState::Streaming(tx);
        Ok(())
    }

    /// Write a body chunk, flushing headers first if needed
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<(), ResponseError> {
        if matches!(self.state, BodyState::Pending) {
            self.flush_headers()?;
        }
        match &self.state {
            BodyState::Streaming(tx) => tx
                .send(chunk.into())
                .await
                .map_err(|_| ResponseError::Disconnected),
            BodyState::Ended => Err(ResponseError::BodyAlreadyWritten),
            BodyState::Pending => Err(ResponseError::HeadersAlreadySent),
        }
    }

    /// Close a streaming body. No-op when nothing is streaming.
    pub fn finish(&mut self) {
        if let BodyState::Streaming(_) = self.state {
            // Dropping the sender ends the body stream
            self.state = BodyState::Ended;
            debug!("Closed streaming response");
        }
    }

    /// Resolves once the client can no longer receive this response
    pub async fn closed(&mut self) {
        match &mut self.state {
            BodyState::Streaming(tx) => tx.closed().await,
            BodyState::Pending => {
                if let Some(head_tx) = self.head_tx.as_mut() {
                    head_tx.closed().await;
                }
            }
            BodyState::Ended => {}
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the head has left
    pub fn headers_sent(&self) -> bool {
        !matches!(self.state, BodyState::Pending)
    }

    /// Whether the body is complete
    pub fn is_ended(&self) -> bool {
        matches!(self.state, BodyState::Ended)
    }

    /// Whether a streaming body is open
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, BodyState::Streaming(_))
    }

    fn ensure_pending(&self) -> Result<(), ResponseError> {
        match self.state {
            BodyState::Pending => Ok(()),
            BodyState::Streaming(_) => Err(ResponseError::HeadersAlreadySent),
            BodyState::Ended => Err(ResponseError::BodyAlreadyWritten),
        }
    }

    fn send_complete(&mut self, body: Bytes) -> Result<(), ResponseError> {
        let body = Full::new(body)
            .map_err(|never: Infallible| match never {})
            .boxed_unsync();
        let sent = self.send_head(body);
        self.state = BodyState::Ended;
        sent
    }

    fn send_head(&mut self, body: ResponseBody) -> Result<(), ResponseError> {
        let head_tx = self.head_tx.take().ok_or(ResponseError::HeadersAlreadySent)?;

        let mut response = hyper::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();

        head_tx
            .send(response)
            .map_err(|_| ResponseError::Disconnected)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("headers_sent", &self.headers_sent())
            .field("ended", &self.is_ended())
            .finish()
    }
}
