//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sunny_http_server::sse::{FrameSplitter, data_payload};
use sunny_session_storage::ChatTurn;
use tracing::{debug, warn};

use super::{CompletionError, CompletionProvider, TokenStream};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f64 = 0.4;

/// Terminal payload of an upstream stream
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Content>,
    #[serde(default)]
    delta: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn message(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }

    fn delta(self) -> Option<String> {
        self.choices.into_iter().next()?.delta?.content
    }
}

/// Chat completions over HTTP
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(
        &self,
        messages: &[ChatTurn],
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        debug!(model = %self.config.model, turns = messages.len(), stream, "Requesting completion");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &self.config.model,
                messages,
                temperature: TEMPERATURE,
                stream,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, CompletionError> {
        let response: CompletionResponse = self.post(messages, false).await?.json().await?;
        Ok(response
            .message()
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }

    async fn stream(&self, messages: &[ChatTurn]) -> Result<TokenStream, CompletionError> {
        let response = self.post(messages, true).await?;
        Ok(token_stream(response.bytes_stream()))
    }
}

/// Turn an upstream event stream into reply fragments.
///
/// Ends at `data: [DONE]` or when the bytes run out. Frames that do not parse
/// are logged and skipped; a transport error ends the stream with that error.
pub fn token_stream<S, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<CompletionError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut frames = FrameSplitter::new();

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    let err: CompletionError = err.into();
                    yield Err(err);
                    break 'read;
                }
            };
            frames.push(&chunk);

            while let Some(frame) = frames.next_frame() {
                let Some(payload) = data_payload(&frame) else {
                    continue;
                };
                if payload == DONE_SENTINEL {
                    break 'read;
                }
                match serde_json::from_str::<CompletionResponse>(payload) {
                    Ok(parsed) => {
                        if let Some(token) = parsed.delta().filter(|t| !t.is_empty()) {
                            yield Ok::<String, CompletionError>(token);
                        }
                    }
                    Err(err) => warn!(error = %err, frame = %frame, "Stream parse error"),
                }
            }
        }
    })
}
