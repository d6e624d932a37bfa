//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::cors::CorsPolicy;

/// Root configuration for the CORS proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, reported scheme).
    pub listener: ListenerConfig,

    /// The single upstream every request is rewritten to.
    pub upstream: UpstreamConfig,

    /// Response header additions and stripping.
    pub headers: HeadersConfig,

    /// CORS policy.
    pub cors: CorsConfig,

    /// Authorization gate.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Scheme reported for inbound requests (the listener itself is plain TCP).
    pub scheme: String,

    /// Take the inbound scheme from `X-Forwarded-Proto` when present.
    pub trust_forwarded_proto: bool,

    /// Server identity placed in request metadata.
    pub server_software: String,

    /// Maximum buffered request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            scheme: "http".to_string(),
            trust_forwarded_proto: false,
            server_software: default_server_software(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Identity of the built-in server: `cors-proxy/<version> hyper`.
pub fn default_server_software() -> String {
    format!("cors-proxy/{} hyper", env!("CARGO_PKG_VERSION"))
}

/// Upstream target.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream host name. Required.
    pub host: String,

    /// Explicit port; defaults to 80/443 by protocol.
    pub port: Option<u16>,

    /// Force `http` or `https` (any casing); unset keeps the inbound scheme.
    pub target_protocol: Option<String>,
}

/// Response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Headers appended to every proxied response, in order.
    pub add: Vec<(String, String)>,

    /// Server identity substrings that require hop-by-hop stripping.
    pub constrained_servers: Vec<String>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            add: Vec::new(),
            constrained_servers: vec!["WSGIServer".to_string(), "hyper".to_string()],
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `true`, `false`, `"*"`, a single origin, or a list of origins.
    pub allow_from: CorsPolicy,

    /// Inject the first listed origin when an origin list has no match.
    pub legacy_origin_fallback: bool,
}

/// Authorization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted bearer tokens. Empty disables the gate.
    pub bearer_tokens: Vec<String>,

    /// 401 body for a wrong token. A missing token always gets an empty body.
    pub deny_message: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
