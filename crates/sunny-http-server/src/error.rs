//! Errors raised while dispatching a request

use http::StatusCode;
use sunny_session_storage::SessionStorageError;

use crate::ResponseError;

/// Generic message used whenever an error has nothing safe to show the client
pub const GENERIC_ERROR_MESSAGE: &str = "Internal Server Error";

/// An error travelling the dispatcher's error path.
///
/// Errors with a declared status are reported to the client verbatim as
/// `{"error": message}`. Errors without one become a 500 with a generic
/// message; the original is logged and never leaked.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Malformed input such as an unparsable JSON body or a missing field (400)
    #[error("{0}")]
    Validation(String),

    /// Nothing can serve the request (404)
    #[error("{0}")]
    NotFound(String),

    /// Request body larger than the configured limit (413)
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// A downstream provider failed (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Arbitrary declared status with an optional client-facing message
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or(GENERIC_ERROR_MESSAGE))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    /// The response surface was misused or the client went away
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Session backend failure
    #[error("Session storage error: {0}")]
    Session(#[from] SessionStorageError),

    /// Anything unexpected
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HttpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: Some(message.into()),
        }
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{}", msg))
    }

    /// The status this error declares, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Validation(_) => Some(StatusCode::BAD_REQUEST),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::PayloadTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            Self::Upstream(_) => Some(StatusCode::BAD_GATEWAY),
            Self::Status { status, .. } => Some(*status),
            Self::Response(_) | Self::Session(_) | Self::Internal(_) => None,
        }
    }

    /// Status written to the client: the declared one, else 500
    pub fn response_status(&self) -> StatusCode {
        self.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message that is safe to send to the client
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) | Self::Upstream(msg) => msg.clone(),
            Self::PayloadTooLarge(_) => "Request body too large".to_string(),
            Self::Status { message, .. } => message
                .clone()
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            Self::Response(_) | Self::Session(_) | Self::Internal(_) => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
        }
    }

    /// JSON body for the default error response
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.client_message() })
    }
}
