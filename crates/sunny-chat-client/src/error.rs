//! Error types for chat client operations

use thiserror::Error;

/// Result type for chat client operations
pub type Result<T> = std::result::Result<T, ChatClientError>;

#[derive(Error, Debug)]
pub enum ChatClientError {
    /// Network/connection errors
    #[error("Connection error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status, with the server's `{error}` message when it sent one
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The event stream broke off or ended without completing
    #[error("Stream error: {0}")]
    Stream(String),

    /// In-band `{error}` frame from the server
    #[error("Server error: {0}")]
    Server(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}
