//! HTTP routes and the application router

mod chat;
mod errors;
mod health;
mod method;
mod quote;

pub use chat::{ChatHandler, MAX_HISTORY_TURNS, SYSTEM_PROMPT};
pub use errors::GlobalErrorHandler;
pub use health::Health;
pub use method::PostOnly;
pub use quote::QuoteHandler;

use std::sync::Arc;

use sunny_http_server::{CookieParser, Cors, Handler, Router, SessionLayer};

use crate::AppState;

/// Assemble the application: CORS, body reader, cookies and sessions run in
/// front of every route; the error handler runs last.
pub fn build_router(state: &AppState) -> Router {
    Router::new()
        .middleware(Cors::new(state.cors.clone()))
        .middleware(state.server.body_reader())
        .middleware(CookieParser)
        .middleware(SessionLayer::new(
            Arc::clone(&state.store),
            state.session.clone(),
        ))
        .get("/health", Health)
        .nest(
            "/api/chat",
            chat::router(Arc::clone(&state.completion), Arc::clone(&state.quotes)),
        )
        .post("/api/quote", QuoteHandler::new(Arc::clone(&state.quotes)))
        .mount("/api/quote", vec![Handler::plain(PostOnly)])
        .catch(GlobalErrorHandler)
}
