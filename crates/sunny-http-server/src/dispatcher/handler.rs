//! Handler traits and the continuation result

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{HttpError, Request, Response};

/// How dispatch continues after a handler returns successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Advance to the next handler or matching layer
    Continue,
    /// The response is handled; stop walking the stack
    Done,
}

/// A plain handler: runs only while no error is pending
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError>;
}

/// An error-aware handler: runs only while an error is pending.
///
/// Returning `Err` passes an error further down the stack, `Ok(Next::Continue)`
/// clears it and resumes normal dispatch.
#[async_trait]
pub trait ErrorMiddleware: Send + Sync {
    async fn handle_error(
        &self,
        err: HttpError,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<Next, HttpError>;
}

/// One entry of a layer's handler list, tagged with how it participates in dispatch
#[derive(Clone)]
pub enum Handler {
    Plain(Arc<dyn Middleware>),
    ErrorAware(Arc<dyn ErrorMiddleware>),
}

impl Handler {
    pub fn plain(middleware: impl Middleware + 'static) -> Self {
        Self::Plain(Arc::new(middleware))
    }

    pub fn error_aware(middleware: impl ErrorMiddleware + 'static) -> Self {
        Self::ErrorAware(Arc::new(middleware))
    }

    pub fn is_error_aware(&self) -> bool {
        matches!(self, Self::ErrorAware(_))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Handler::Plain"),
            Self::ErrorAware(_) => f.write_str("Handler::ErrorAware"),
        }
    }
}

type HandlerFuture<'a> = BoxFuture<'a, Result<Next, HttpError>>;

struct FnHandler<F>(F);

#[async_trait]
impl<F> Middleware for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        (self.0)(req, res).await
    }
}

/// Wrap a closure returning a boxed future as a plain handler
///
/// ```rust
/// use sunny_http_server::{HttpError, Next, handler_fn};
///
/// let health = handler_fn(|_req, res| {
///     Box::pin(async move {
///         res.json(&serde_json::json!({"status": "ok"}))?;
///         Ok::<_, HttpError>(Next::Done)
///     })
/// });
/// assert!(!health.is_error_aware());
/// ```
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    Handler::Plain(Arc::new(FnHandler(f)))
}
