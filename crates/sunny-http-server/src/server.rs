//! hyper server runner

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::body::DEFAULT_MAX_BODY_SIZE;
use crate::error::GENERIC_ERROR_MESSAGE;
use crate::{JsonBody, Request, Response, ResponseBody, Result, Router};

/// Default port when none is configured
pub const DEFAULT_PORT: u16 = 3001;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Maximum request body size accepted by the body reader
    pub max_body_size: usize,
}

impl ServerConfig {
    /// Body reader enforcing this configuration's size limit
    pub fn body_reader(&self) -> JsonBody {
        JsonBody::new(self.max_body_size)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Builder for [`HttpServer`]
#[derive(Default)]
pub struct HttpServerBuilder {
    config: ServerConfig,
    router: Router,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the application's root router
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn build(self) -> HttpServer {
        HttpServer {
            config: self.config,
            router: Arc::new(self.router),
        }
    }
}

/// HTTP/1.1 server driving one [`Router`]
#[derive(Clone)]
pub struct HttpServer {
    config: ServerConfig,
    router: Arc<Router>,
}

impl HttpServer {
    pub fn builder() -> HttpServerBuilder {
        HttpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_address).await?)
    }

    /// Bind and serve until the process stops
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("HTTP server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let router = Arc::clone(&self.router);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(req, Arc::clone(&router)));

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {}", err);
                }
            });
        }
    }
}

/// Run one request through the router.
///
/// Dispatch runs on its own task so a streaming handler can keep writing
/// after the head has been handed to hyper.
async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    router: Arc<Router>,
) -> std::result::Result<hyper::Response<ResponseBody>, Infallible> {
    let mut request = Request::from_hyper(req);
    debug!("Handling {} {}", request.method, request.path);

    let (mut response, pending) = Response::channel();
    tokio::spawn(async move {
        router.dispatch(&mut request, &mut response).await;
    });

    match pending.await {
        Ok(response) => Ok(response),
        Err(_) => {
            error!("Request finished without a response");
            Ok(internal_error())
        }
    }
}

fn internal_error() -> hyper::Response<ResponseBody> {
    let body = serde_json::json!({ "error": GENERIC_ERROR_MESSAGE }).to_string();
    let mut response = hyper::Response::new(
        Full::new(Bytes::from(body))
            .map_err(|never: Infallible| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
    response
}
