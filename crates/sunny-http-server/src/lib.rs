//! # Sunny HTTP Server
//!
//! A small, self-hosted HTTP processing engine on top of hyper.
//!
//! ## Components
//! - **Dispatcher** ([`Router`]): an ordered stack of prefix-mounted middleware
//!   and exact-path routes, resolved with an explicit continuation protocol
//! - **Response surface** ([`Response`]): chainable status/header/cookie setters
//!   plus terminal JSON/text writers and a streaming mode
//! - **Cookies** ([`cookie`]): `Cookie` header decoding and `Set-Cookie` encoding
//! - **Body reader** ([`JsonBody`]): buffers the request body and parses JSON
//! - **Sessions** ([`SessionLayer`]): attaches a TTL-bounded session per client
//! - **SSE** ([`sse`]): `data:` framed event streams and a matching decoder
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sunny_http_server::{
//!     CookieParser, Cors, CorsOptions, HttpError, HttpServer, JsonBody, Middleware, Next,
//!     Request, Response, Router, SessionConfig, SessionLayer,
//! };
//! use sunny_session_storage::InMemorySessionStore;
//!
//! struct Health;
//!
//! #[async_trait::async_trait]
//! impl Middleware for Health {
//!     async fn handle(&self, _req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
//!         res.json(&serde_json::json!({"status": "ok"}))?;
//!         Ok(Next::Done)
//!     }
//! }
//!
//! # async fn run() -> sunny_http_server::Result<()> {
//! let store = Arc::new(InMemorySessionStore::new());
//! let router = Router::new()
//!     .middleware(Cors::new(CorsOptions::default()))
//!     .middleware(JsonBody::default())
//!     .middleware(CookieParser)
//!     .middleware(SessionLayer::new(store, SessionConfig::default()))
//!     .get("/health", Health);
//!
//! HttpServer::builder().router(router).build().run().await
//! # }
//! ```

pub mod body;
pub mod cookie;
pub mod cors;
pub mod dispatcher;
pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod session;
#[cfg(feature = "sse")]
pub mod sse;

#[cfg(test)]
mod tests;

pub use body::JsonBody;
pub use cookie::{CookieOptions, CookieParser, SameSite};
pub use cors::{AllowedOrigin, Cors, CorsOptions};
pub use dispatcher::{
    ErrorMiddleware, Handler, Layer, LayerKind, Middleware, Next, Router, handler_fn,
};
pub use error::HttpError;
pub use request::{Request, RequestBody};
pub use response::{PendingResponse, Response, ResponseBody, ResponseError};
pub use server::{HttpServer, HttpServerBuilder, ServerConfig};
pub use session::{SessionConfig, SessionLayer};

/// Result type for server lifecycle operations
pub type Result<T> = std::result::Result<T, HttpServerError>;

/// Transport-level server errors
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
