use anyhow::Context;
use sunny_http_server::HttpServer;
use sunny_server::{AppState, Config, build_router};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; chat requests will fail");
    }

    let state = AppState::from_config(&config).context("Failed to load pricing")?;
    let server = HttpServer::builder()
        .config(state.server.clone())
        .router(build_router(&state))
        .build();

    info!(
        "Sunny backend listening on {} (origin: {}, model: {})",
        config.bind_address(),
        config.allowed_origin(),
        config.openai_model
    );
    server.run().await?;

    Ok(())
}
