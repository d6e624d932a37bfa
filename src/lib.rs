//! CORS-enabling rewriting proxy library.
//!
//! Rewrites inbound request metadata to target one fixed upstream, gates
//! requests through a pluggable authorization hook, and filters upstream
//! response headers (hop-by-hop stripping, configured headers, CORS).

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{CorsProxy, CorsProxyBuilder, Forwarder, Protocol, RequestMetadata, ResponseHead, StartResponse};
pub use security::{AuthChecker, AuthDecision, CorsPolicy};
