//! Command line and environment configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use sunny_http_server::body::DEFAULT_MAX_BODY_SIZE;
use sunny_http_server::server::DEFAULT_PORT;
use sunny_http_server::{CorsOptions, ServerConfig, SessionConfig};

use crate::completion::{DEFAULT_API_URL, DEFAULT_MODEL, OpenAiConfig};

/// Session lifetime when `SESSION_TTL_SECS` is not set: 4 hours
pub const DEFAULT_SESSION_TTL_SECS: u64 = 4 * 60 * 60;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Interface to listen on
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Origin allowed to call the API. `*` mirrors the caller without credentials.
    #[arg(long, env = "FRONTEND_ORIGIN")]
    pub frontend_origin: Option<String>,

    /// Fallback for `FRONTEND_ORIGIN`
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Absolute session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: u64,

    /// Mark the session cookie `Secure`
    #[arg(long, env = "SESSION_COOKIE_SECURE", action = clap::ArgAction::Set, default_value_t = false)]
    pub session_cookie_secure: bool,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    pub max_body_bytes: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    /// Chat completions endpoint
    #[arg(long, env = "OPENAI_API_URL", default_value = DEFAULT_API_URL)]
    pub openai_api_url: String,

    /// JSON pricing table replacing the built-in tiers
    #[arg(long, env = "PRICING_FILE")]
    pub pricing_file: Option<PathBuf>,
}

impl Config {
    /// Load `.env` (without overriding the environment) and parse arguments
    pub fn new() -> Self {
        dotenv().ok();
        Config::parse()
    }

    /// `FRONTEND_ORIGIN`, then `CORS_ORIGIN`, then `*`
    pub fn allowed_origin(&self) -> &str {
        self.frontend_origin
            .as_deref()
            .or(self.cors_origin.as_deref())
            .unwrap_or("*")
    }

    pub fn cors_options(&self) -> CorsOptions {
        CorsOptions::for_frontend(self.allowed_origin())
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind_address(),
            max_body_size: self.max_body_bytes,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            secure: self.session_cookie_secure,
            ..SessionConfig::default()
        }
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            api_url: self.openai_api_url.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
