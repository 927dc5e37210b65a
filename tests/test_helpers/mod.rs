//! Shared helpers: start a real server on an ephemeral port and scripted
//! collaborators for the chat backend

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use sunny_http_server::{CorsOptions, HttpServer, Router, ServerConfig, SessionConfig};
use sunny_server::{
    AppState, CompletionError, CompletionProvider, TieredPricing, TokenStream, build_router,
};
use sunny_session_storage::{ChatTurn, InMemorySessionStore};
use tokio::net::TcpListener;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Serve `router` on 127.0.0.1 with an OS-assigned port
pub async fn serve(router: Router) -> anyhow::Result<SocketAddr> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = HttpServer::builder().router(router).build();

    tokio::spawn(async move {
        if let Err(err) = server.serve(listener).await {
            tracing::error!("Test server stopped: {}", err);
        }
    });

    Ok(addr)
}

/// HTTP client with a cookie jar, like a browser
pub fn browser() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().cookie_store(true).build()?)
}

/// Completion provider replaying a fixed script
pub struct ScriptedProvider {
    tokens: Vec<Result<String, String>>,
    prompts: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedProvider {
    pub fn replying(tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: tokens.iter().map(|t| Ok(t.to_string())).collect(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_after(tokens: &[&str], error: &str) -> Arc<Self> {
        let mut script: Vec<_> = tokens.iter().map(|t| Ok(t.to_string())).collect();
        script.push(Err(error.to_string()));
        Arc::new(Self {
            tokens: script,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<Vec<ChatTurn>> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, messages: &[ChatTurn]) {
        self.prompts.lock().unwrap().push(messages.to_vec());
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, CompletionError> {
        self.record(messages);
        self.tokens
            .iter()
            .map(|t| t.clone().map_err(CompletionError::Decode))
            .collect()
    }

    async fn stream(&self, messages: &[ChatTurn]) -> Result<TokenStream, CompletionError> {
        self.record(messages);
        let items: Vec<_> = self
            .tokens
            .iter()
            .map(|t| t.clone().map_err(CompletionError::Decode))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

/// The chat backend wired to a scripted provider, served over TCP
pub async fn spawn_chat_app(provider: Arc<ScriptedProvider>) -> anyhow::Result<SocketAddr> {
    let state = AppState {
        server: ServerConfig::default(),
        cors: CorsOptions::for_frontend("*"),
        session: SessionConfig::default(),
        store: Arc::new(InMemorySessionStore::new()),
        completion: provider,
        quotes: Arc::new(TieredPricing::default()),
    };
    serve(build_router(&state)).await
}
