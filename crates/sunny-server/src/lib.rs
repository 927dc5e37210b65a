//! # Sunny Server
//!
//! The Sunny chat backend: a [`sunny_http_server::Router`] wired with CORS,
//! JSON bodies, cookies and sessions in front of three routes.
//!
//! - `GET /health` returns `{"status":"ok"}`
//! - `POST /api/chat` answers a message, either as `{reply}` or as an SSE
//!   token stream, keeping the conversation in the caller's session; solar
//!   pricing questions are answered from the pricing table
//! - `POST /api/quote` prices a panel-cleaning job from the tiered pricing table
//!
//! Completions and quotes come from injected [`CompletionProvider`] and
//! [`QuoteProvider`] implementations.

pub mod completion;
pub mod config;
pub mod intent;
pub mod quote;
pub mod routes;

use std::sync::Arc;

use sunny_http_server::{CorsOptions, ServerConfig, SessionConfig};
use sunny_session_storage::{BoxedSessionStore, InMemorySessionStore};

pub use completion::{CompletionError, CompletionProvider, OpenAiConfig, OpenAiProvider, TokenStream};
pub use config::Config;
pub use quote::{PricingTable, Quote, QuoteError, QuoteProvider, TieredPricing};
pub use routes::{MAX_HISTORY_TURNS, SYSTEM_PROMPT, build_router};

/// Everything the routes need, injected at startup
#[derive(Clone)]
pub struct AppState {
    pub server: ServerConfig,
    pub cors: CorsOptions,
    pub session: SessionConfig,
    pub store: Arc<BoxedSessionStore>,
    pub completion: Arc<dyn CompletionProvider>,
    pub quotes: Arc<dyn QuoteProvider>,
}

impl AppState {
    /// Build the production state from configuration
    pub fn from_config(config: &Config) -> Result<Self, QuoteError> {
        let quotes = match &config.pricing_file {
            Some(path) => TieredPricing::from_file(path)?,
            None => TieredPricing::default(),
        };

        Ok(Self {
            server: config.server_config(),
            cors: config.cors_options(),
            session: config.session_config(),
            store: Arc::new(InMemorySessionStore::with_ttl(config.session_ttl())),
            completion: Arc::new(OpenAiProvider::new(config.openai_config())),
            quotes: Arc::new(quotes),
        })
    }
}
