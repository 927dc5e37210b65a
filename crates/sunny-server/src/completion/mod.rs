//! Language-model completion providers

mod openai;

pub use openai::{DEFAULT_API_URL, DEFAULT_MODEL, OpenAiConfig, OpenAiProvider, token_stream};

use async_trait::async_trait;
use futures::stream::BoxStream;
use sunny_session_storage::ChatTurn;

/// Lazily produced reply fragments
pub type TokenStream = BoxStream<'static, Result<String, CompletionError>>;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("Connection error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the upstream API
    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    Decode(String),
}

/// Produces assistant replies for a prompt.
///
/// `messages` is the full prompt: system prompt, prior turns, then the new
/// user message.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whole reply at once
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, CompletionError>;

    /// Reply as a stream of fragments. Dropping the stream abandons the
    /// upstream request.
    async fn stream(&self, messages: &[ChatTurn]) -> Result<TokenStream, CompletionError>;
}
