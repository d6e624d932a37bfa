//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Translate each request into metadata and run it through `CorsProxy`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ListenerConfig, ProxyConfig};
use crate::error::ProxyError;
use crate::http::request::{metadata_from_parts, propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::CapturedResponse;
use crate::proxy::{CorsProxy, Forwarder, HttpForwarder};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<CorsProxy>,
    pub listener: Arc<ListenerConfig>,
    pub local_addr: Option<SocketAddr>,
}

/// HTTP server for the CORS proxy.
pub struct HttpServer {
    config: ProxyConfig,
    proxy: Arc<CorsProxy>,
}

impl HttpServer {
    /// Create a new HTTP server forwarding with the built-in HTTP client.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let forwarder = HttpForwarder::new(
            Duration::from_secs(config.timeouts.connect_secs),
            config.listener.max_body_bytes,
        )
        .map_err(|e| ConfigError::Client(e.to_string()))?;
        Self::with_forwarder(config, Arc::new(forwarder))
    }

    /// Create a server with a custom forwarder.
    pub fn with_forwarder(config: ProxyConfig, forwarder: Arc<dyn Forwarder>) -> Result<Self, ConfigError> {
        let proxy = Arc::new(CorsProxy::from_config(&config, forwarder)?);
        Ok(Self { config, proxy })
    }

    /// The shared proxy, e.g. to change the target protocol at runtime.
    pub fn proxy(&self) -> Arc<CorsProxy> {
        self.proxy.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self, local_addr: Option<SocketAddr>) -> Router {
        let state = AppState {
            proxy: self.proxy.clone(),
            listener: Arc::new(self.config.listener.clone()),
            local_addr,
        };

        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.host,
            "HTTP server starting"
        );

        let app = self
            .router(Some(addr))
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let local_addr = state
        .local_addr
        .or_else(|| state.listener.bind_address.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 80)));

    let request_id = request_id(&parts).to_string();
    let metadata = metadata_from_parts(&parts, remote_addr, local_addr, &state.listener);

    let mut captured = CapturedResponse::new();
    let result = state.proxy.handle(metadata, body, &mut captured).await;

    match result.and_then(|body| captured.into_response(body)) {
        Ok(response) => response,
        Err(e) => {
            log_failure(&request_id, &e);
            e.into_response()
        }
    }
}

fn log_failure(request_id: &str, error: &ProxyError) {
    match error {
        ProxyError::Upstream(_) | ProxyError::NoResponse => {
            tracing::error!(request_id = %request_id, error = %error, "Upstream error");
        }
        _ => {
            tracing::warn!(request_id = %request_id, error = %error, kind = error.kind(), "Request failed");
        }
    }
}
