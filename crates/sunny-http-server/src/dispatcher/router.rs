//! Layer stack and the dispatch walk

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use http::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use super::{ErrorMiddleware, Handler, Layer, Middleware, Next};
use crate::{HttpError, Request, Response};

/// Result of walking a stack or a single layer
enum Resolution {
    /// A handler produced the response
    Handled,
    /// Nothing terminal happened; carries the pending error, if any
    Exhausted(Option<HttpError>),
}

/// Ordered stack of mounts and routes
///
/// A `Router` is itself a plain [`Middleware`], so routers nest: mounting a
/// router under `/api/chat` lets it match `/` against `/api/chat`. When a
/// nested router runs out of layers it hands control, and any pending error,
/// back to its parent.
#[derive(Debug, Clone, Default)]
pub struct Router {
    layers: Vec<Layer>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. Layers are never reordered or deduplicated.
    pub fn register(&mut self, layer: Layer) -> &mut Self {
        self.layers.push(layer);
        self
    }

    /// Builder form of [`Router::register`]
    pub fn layer(mut self, layer: Layer) -> Self {
        self.register(layer);
        self
    }

    /// Mount a plain handler at the root
    pub fn middleware(self, middleware: impl Middleware + 'static) -> Self {
        self.mount("/", vec![Handler::plain(middleware)])
    }

    /// Mount an error-aware handler at the root
    pub fn catch(self, handler: impl ErrorMiddleware + 'static) -> Self {
        self.mount("/", vec![Handler::error_aware(handler)])
    }

    /// Mount handlers under a prefix
    pub fn mount(self, prefix: &str, handlers: Vec<Handler>) -> Self {
        self.layer(Layer::mount(prefix, handlers))
    }

    /// Mount a nested router under a prefix
    pub fn nest(self, prefix: &str, router: Router) -> Self {
        self.mount(prefix, vec![Handler::plain(router)])
    }

    /// Exact method and path route with a handler list
    pub fn route(self, method: Method, path: &str, handlers: Vec<Handler>) -> Self {
        self.layer(Layer::route(method, path, handlers))
    }

    pub fn get(self, path: &str, handler: impl Middleware + 'static) -> Self {
        self.route(Method::GET, path, vec![Handler::plain(handler)])
    }

    pub fn post(self, path: &str, handler: impl Middleware + 'static) -> Self {
        self.route(Method::POST, path, vec![Handler::plain(handler)])
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Resolve one request. Always leaves the response written: by a handler,
    /// or by the default 404 / error reply.
    pub async fn dispatch(&self, req: &mut Request, res: &mut Response) {
        debug!(method = %req.method, path = %req.path, "Dispatching request");

        match self.walk(req, res).await {
            Resolution::Handled => {}
            Resolution::Exhausted(None) => {
                if res.headers_sent() {
                    res.finish();
                } else {
                    write_default(res, StatusCode::NOT_FOUND, json!({"error": "Not Found"}));
                }
            }
            Resolution::Exhausted(Some(err)) => {
                error!(error = %err, path = %req.original_path(), "Unhandled error");
                if res.headers_sent() {
                    // Too late to change the status; the stream just ends
                    res.finish();
                } else {
                    write_default(res, err.response_status(), err.to_json());
                }
            }
        }
    }

    async fn walk(&self, req: &mut Request, res: &mut Response) -> Resolution {
        let mut pending: Option<HttpError> = None;

        for layer in &self.layers {
            if !layer.matches(&req.method, &req.path) {
                continue;
            }

            let saved_path = layer
                .rewrite_path(&req.path)
                .map(|stripped| std::mem::replace(&mut req.path, stripped));

            let resolution = run_handlers(layer.handlers(), req, res, pending.take()).await;

            if let Some(path) = saved_path {
                req.path = path;
            }

            match resolution {
                Resolution::Handled => return Resolution::Handled,
                Resolution::Exhausted(err) => pending = err,
            }
        }

        Resolution::Exhausted(pending)
    }
}

#[async_trait]
impl Middleware for Router {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        match self.walk(req, res).await {
            Resolution::Handled => Ok(Next::Done),
            Resolution::Exhausted(None) => Ok(Next::Continue),
            Resolution::Exhausted(Some(err)) => Err(err),
        }
    }
}

async fn run_handlers(
    handlers: &[Handler],
    req: &mut Request,
    res: &mut Response,
    mut pending: Option<HttpError>,
) -> Resolution {
    for handler in handlers {
        let outcome = match (handler, pending.take()) {
            (Handler::Plain(h), None) => catch_panic(h.handle(req, res)).await,
            (Handler::ErrorAware(h), Some(err)) => catch_panic(h.handle_error(err, req, res)).await,
            // Plain handlers are skipped while an error is pending
            (Handler::Plain(_), Some(err)) => Err(err),
            // Error handlers are skipped while none is
            (Handler::ErrorAware(_), None) => Ok(Next::Continue),
        };

        match outcome {
            Ok(Next::Done) => return Resolution::Handled,
            Ok(Next::Continue) => {}
            Err(err) => pending = Some(err),
        }
    }

    Resolution::Exhausted(pending)
}

async fn catch_panic<F>(future: F) -> Result<Next, HttpError>
where
    F: std::future::Future<Output = Result<Next, HttpError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(HttpError::internal(format!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

fn write_default(res: &mut Response, status: StatusCode, body: serde_json::Value) {
    if let Err(err) = res.status(status).json(&body) {
        warn!(error = %err, "Failed to write default response");
    }
}
