//! CORS (Cross-Origin Resource Sharing) support

use async_trait::async_trait;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use http::{Method, StatusCode};

use crate::{HttpError, Middleware, Next, Request, Response};

/// Which origin is echoed in `Access-Control-Allow-Origin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigin {
    /// `*`
    Any,
    /// The request's own `Origin`, or `*` when it has none
    Mirror,
    /// A fixed origin
    Exact(String),
}

impl AllowedOrigin {
    /// `"*"` means any origin, anything else is an exact origin
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "*" => Self::Any,
            origin => Self::Exact(origin.to_string()),
        }
    }

    fn resolve(&self, request_origin: Option<&str>) -> String {
        match self {
            Self::Any => "*".to_string(),
            Self::Mirror => request_origin.unwrap_or("*").to_string(),
            Self::Exact(origin) => origin.clone(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    pub origin: AllowedOrigin,
    /// Adds `Access-Control-Allow-Credentials: true` unless the origin resolves to `*`
    pub credentials: bool,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: AllowedOrigin::Any,
            credentials: false,
        }
    }
}

impl CorsOptions {
    /// Options for a configured frontend origin: `*` mirrors the caller without
    /// credentials, a concrete origin is pinned and allows credentials.
    pub fn for_frontend(origin: &str) -> Self {
        match AllowedOrigin::parse(origin) {
            AllowedOrigin::Any => Self {
                origin: AllowedOrigin::Mirror,
                credentials: false,
            },
            exact => Self {
                origin: exact,
                credentials: true,
            },
        }
    }
}

/// CORS middleware. Answers preflight `OPTIONS` requests itself with 204.
#[derive(Debug, Clone)]
pub struct Cors {
    options: CorsOptions,
}

impl Cors {
    pub fn new(options: CorsOptions) -> Self {
        Self { options }
    }

    /// Apply CORS headers to a response
    pub fn apply_cors_headers(&self, request_origin: Option<&str>, res: &mut Response) {
        let allowed = self.options.origin.resolve(request_origin);

        res.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, allowed.as_str())
            .set_header(ACCESS_CONTROL_ALLOW_METHODS, "GET,POST,OPTIONS")
            .set_header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type");

        if self.options.credentials && allowed != "*" {
            res.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
        }
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        self.apply_cors_headers(req.header(ORIGIN), res);

        if req.method == Method::OPTIONS {
            res.status(StatusCode::NO_CONTENT).end()?;
            return Ok(Next::Done);
        }

        Ok(Next::Continue)
    }
}
