//! Cookie header codec
//!
//! `decode` turns a raw `Cookie` header into a map; `encode` builds a single
//! `Set-Cookie` directive. Attributes are always emitted in the order
//! `name=value; Max-Age; HttpOnly; SameSite; Secure; Path`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use http::header::COOKIE;

use crate::{HttpError, Middleware, Next, Request, Response};

/// `SameSite` attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Lax => f.write_str("Lax"),
            Self::None => f.write_str("None"),
        }
    }
}

/// Attributes for a `Set-Cookie` directive. Absent or false attributes are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// Lifetime; emitted as whole seconds, rounded down
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub secure: bool,
    pub path: Option<String>,
}

impl CookieOptions {
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Parse a `Cookie` header.
///
/// Pairs without `=` are skipped, keys and values are trimmed, values are
/// percent-decoded (kept raw if they do not decode), and the last duplicate wins.
pub fn decode(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.insert(key.trim().to_string(), decoded);
    }

    cookies
}

/// Build a `Set-Cookie` value
pub fn encode(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut parts = vec![format!("{}={}", name, urlencoding::encode(value))];

    if let Some(max_age) = options.max_age.filter(|d| !d.is_zero()) {
        parts.push(format!("Max-Age={}", max_age.as_secs()));
    }
    if options.http_only {
        parts.push("HttpOnly".to_string());
    }
    if let Some(same_site) = options.same_site {
        parts.push(format!("SameSite={}", same_site));
    }
    if options.secure {
        parts.push("Secure".to_string());
    }
    if let Some(path) = options.path.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("Path={}", path));
    }

    parts.join("; ")
}

/// Middleware populating [`Request::cookies`] from every `Cookie` header
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieParser;

#[async_trait]
impl Middleware for CookieParser {
    async fn handle(&self, req: &mut Request, _res: &mut Response) -> Result<Next, HttpError> {
        let header = req
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        req.cookies = decode(&header);
        Ok(Next::Continue)
    }
}
