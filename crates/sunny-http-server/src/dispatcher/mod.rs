//! Request dispatcher
//!
//! The dispatcher is an ordered stack of [`Layer`]s. Each layer is either a
//! prefix **mount** (runs for every request under the prefix, with the prefix
//! stripped from the path) or an exact **route** (method and path must both
//! match). Layers are walked once, in registration order.
//!
//! Inside a layer, handlers run in list order. Each handler reports how the
//! walk continues:
//!
//! - `Ok(Next::Done)`: the handler produced the response, dispatch ends
//! - `Ok(Next::Continue)`: advance to the next handler, then the next matching layer
//! - `Err(error)`: advance in error mode; plain handlers are skipped until an
//!   [`ErrorMiddleware`] takes the error
//!
//! A panicking handler is treated as if it had returned an internal error.
//! When the stack is exhausted the dispatcher answers itself: 404
//! `{"error":"Not Found"}` without an error, or the error's declared status
//! (500 otherwise) with `{"error": message}`.

mod handler;
mod layer;
mod router;

pub use handler::{ErrorMiddleware, Handler, Middleware, Next, handler_fn};
pub use layer::{Layer, LayerKind};
pub use router::Router;
