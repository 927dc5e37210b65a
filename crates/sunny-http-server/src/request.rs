//! Per-connection request state

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde_json::Value;
use sunny_session_storage::SharedSession;

/// Raw inbound body, consumed once by the body reader
pub type RequestBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// An inbound request as seen by the dispatcher and its handlers.
///
/// Created when the connection delivers a request and dropped when dispatch
/// ends. `path` is rewritten while a mount layer runs and restored afterwards;
/// `original_path` never changes.
pub struct Request {
    pub method: Method,
    /// Path relative to the current mount point
    pub path: String,
    /// Query parameters, last write wins for repeated keys
    pub query: HashMap<String, String>,
    /// Headers, case-insensitive
    pub headers: HeaderMap,
    /// Populated by [`crate::CookieParser`]
    pub cookies: HashMap<String, String>,
    /// Parsed JSON body, `{}` until [`crate::JsonBody`] runs or when no body was sent
    pub body: Value,
    /// Attached by [`crate::SessionLayer`]; the record is owned by the store
    pub session: Option<SharedSession>,
    original_path: String,
    raw_body: Option<RequestBody>,
}

impl Request {
    /// Build a request from its parts
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: RequestBody) -> Self {
        let path = match uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Self {
            method,
            original_path: path.clone(),
            path,
            query: parse_query(uri.query()),
            headers,
            cookies: HashMap::new(),
            body: Value::Object(Default::default()),
            session: None,
            raw_body: Some(body),
        }
    }

    /// Adapt a hyper request
    pub fn from_hyper(req: hyper::Request<hyper::body::Incoming>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, &parts.uri, parts.headers, body.boxed_unsync())
    }

    /// Request without a body, mostly for tests and internal use
    pub fn empty(method: Method, uri: &str) -> Self {
        let uri = uri.parse::<Uri>().unwrap_or_else(|_| Uri::from_static("/"));
        let body = Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed_unsync();
        Self::new(method, &uri, HeaderMap::new(), body)
    }

    /// Replace the raw body with an in-memory buffer
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(
            Full::new(body.into())
                .map_err(|never| match never {})
                .boxed_unsync(),
        );
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    /// Path as received, before any mount rewrote it
    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    /// Take the unread body; `None` once a body reader has consumed it
    pub fn take_raw_body(&mut self) -> Option<RequestBody> {
        self.raw_body.take()
    }

    /// Header value as a string, if present and valid
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the client asked for an event stream
    pub fn accepts_event_stream(&self) -> bool {
        self.header(http::header::ACCEPT)
            .is_some_and(|accept| accept.contains("text/event-stream"))
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("original_path", &self.original_path)
            .field("query", &self.query)
            .field("cookies", &self.cookies)
            .field("body", &self.body)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
