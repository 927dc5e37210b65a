//! JSON body reader middleware

use async_trait::async_trait;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tracing::debug;

use crate::{HttpError, Middleware, Next, Request, Response};

/// Default request body limit: 1 MiB
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Buffers the whole request body and parses it as JSON into [`Request::body`].
///
/// An empty body yields `{}`. A body that is not valid JSON fails with a 400
/// through the error path; one larger than the limit fails with a 413.
#[derive(Debug, Clone, Copy)]
pub struct JsonBody {
    max_body_size: usize,
}

impl JsonBody {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

impl Default for JsonBody {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

#[async_trait]
impl Middleware for JsonBody {
    async fn handle(&self, req: &mut Request, _res: &mut Response) -> Result<Next, HttpError> {
        let Some(body) = req.take_raw_body() else {
            // Already consumed further up the stack
            return Ok(Next::Continue);
        };

        let bytes = Limited::new(body, self.max_body_size)
            .collect()
            .await
            .map_err(|err| {
                if err.is::<LengthLimitError>() {
                    HttpError::PayloadTooLarge(self.max_body_size)
                } else {
                    HttpError::internal(format!("Failed to read request body: {}", err))
                }
            })?
            .to_bytes();

        if bytes.is_empty() {
            req.body = Value::Object(Default::default());
            return Ok(Next::Continue);
        }

        req.body = serde_json::from_slice(&bytes).map_err(|err| {
            debug!(error = %err, "Rejecting malformed JSON body");
            HttpError::validation("Invalid JSON body")
        })?;

        Ok(Next::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    async fn read(req: &mut Request, reader: JsonBody) -> Result<Next, HttpError> {
        let (mut res, _pending) = Response::channel();
        reader.handle(req, &mut res).await
    }

    #[tokio::test]
    async fn test_parses_json() {
        let mut req = Request::empty(Method::POST, "/").with_body(r#"{"a":1,"b":[true]}"#);
        assert_eq!(read(&mut req, JsonBody::default()).await.unwrap(), Next::Continue);
        assert_eq!(req.body, json!({"a": 1, "b": [true]}));
        assert_eq!(req.body["a"], 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_object() {
        let mut req = Request::empty(Method::POST, "/");
        assert_eq!(read(&mut req, JsonBody::default()).await.unwrap(), Next::Continue);
        assert_eq!(req.body, json!({}));
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let mut req = Request::empty(Method::POST, "/").with_body("{not json");
        let err = read(&mut req, JsonBody::default()).await.unwrap_err();
        assert_eq!(err.response_status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(err.client_message(), "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut req = Request::empty(Method::POST, "/").with_body(vec![b' '; 64]);
        let err = read(&mut req, JsonBody::new(16)).await.unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge(16)));
    }

    #[tokio::test]
    async fn test_second_reader_is_a_no_op() {
        let mut req = Request::empty(Method::POST, "/").with_body(r#"{"a":1}"#);
        read(&mut req, JsonBody::default()).await.unwrap();
        read(&mut req, JsonBody::default()).await.unwrap();
        assert_eq!(req.body, json!({"a": 1}));
    }
}
