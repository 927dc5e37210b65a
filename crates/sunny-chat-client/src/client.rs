//! HTTP chat client

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use sunny_http_server::sse::{SseDecoder, StreamEvent};
use tracing::{debug, warn};
use url::Url;

use crate::{ChatClientError, Result};

/// Per-request timeout for one-shot replies
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ReplyBody {
    reply: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Chat client bound to one endpoint and one session
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: Url,
}

impl ChatClient {
    /// Create a client with its own cookie jar
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("sunny-chat-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(endpoint, client)
    }

    /// Use a preconfigured client. Session reuse needs its cookie store enabled.
    pub fn with_client(endpoint: &str, client: Client) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ChatClientError::Config(format!("Invalid URL: {}", e)))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ChatClientError::Config(format!(
                "Unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a message and wait for the whole reply
    pub async fn send(&self, message: &str) -> Result<String> {
        debug!(endpoint = %self.endpoint, "Sending chat message");

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(DEFAULT_TIMEOUT)
            .json(&json!({ "message": message }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: ReplyBody = response.json().await?;
        Ok(body.reply)
    }

    /// Send a message and stream the reply, calling `on_token` for each
    /// fragment. Returns the accumulated reply once the server signals
    /// completion.
    pub async fn stream<F>(&self, message: &str, on_token: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("stream", "true");
        debug!(endpoint = %url, "Streaming chat message");

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(&json!({ "message": message }))
            .send()
            .await?;
        let response = check_status(response).await?;

        consume_stream(Box::pin(response.bytes_stream()), on_token).await
    }
}

/// Decode a chat event stream from any byte stream.
///
/// Returns the reply on `{done: true}`, the server's message on an `{error}`
/// frame, and a stream error if the bytes run out first.
pub async fn consume_stream<S, B, E, F>(mut stream: S, mut on_token: F) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(&str),
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ChatClientError::Stream(e.to_string()))?;

        for event in decoder.feed(chunk.as_ref()) {
            match event {
                StreamEvent::Token(token) => on_token(&token),
                StreamEvent::Done => return Ok(decoder.into_reply()),
                StreamEvent::Error(message) => return Err(ChatClientError::Server(message)),
            }
        }
    }

    warn!("Event stream ended without a completion frame");
    Err(ChatClientError::Stream(
        "Stream ended before completion".to_string(),
    ))
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ChatClientError::Status {
        status: status.as_u16(),
        message,
    })
}
