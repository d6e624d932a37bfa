//! Request/response rewriting pipeline.
//!
//! # Data Flow
//! ```text
//! RequestMetadata (inbound)
//!     → security::access_control (AuthChecker; deny → 401, stop)
//!     → rewrite.rs (scheme, secure marker, port, server name, Host)
//!     → forward.rs (Forwarder, with a filtering StartResponse)
//!     → security::headers (strip, add headers, CORS)
//!     → caller's StartResponse + body
//! ```
//!
//! # Design Decisions
//! - One `CorsProxy` per upstream, shared across requests
//! - The target protocol is stored raw and parsed on every read, so a value
//!   set at runtime behaves exactly like one given at construction
//! - Per-request state lives on the stack of `handle`; only the last
//!   rewritten request is kept for diagnostics

pub mod forward;
pub mod metadata;
pub mod protocol;
pub mod rewrite;

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::schema::ProxyConfig;
use crate::config::loader::ConfigError;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::security::access_control::{AuthChecker, AuthDecision, BearerTokenAuth};
use crate::security::cors::CorsPolicy;
use crate::security::headers::{parse_header_pairs, ResponseFilter, WSGIREF_MARKER};

pub use forward::{Forwarder, HttpForwarder, StartResponse};
pub use metadata::{HeaderList, RequestMetadata, ResponseHead};
pub use protocol::Protocol;
pub use rewrite::Upstream;

/// Marker of this crate's own HTTP server, which sets framing headers itself.
pub const HYPER_MARKER: &str = "hyper";

/// Rewriting proxy in front of a single upstream.
pub struct CorsProxy {
    upstream: Upstream,
    target_protocol: ArcSwapOption<String>,
    auth: Option<Arc<dyn AuthChecker>>,
    filter: ResponseFilter,
    forwarder: Arc<dyn Forwarder>,
    last_request: ArcSwapOption<RequestMetadata>,
}

impl CorsProxy {
    pub fn builder(host: impl Into<String>, forwarder: impl Forwarder + 'static) -> CorsProxyBuilder {
        CorsProxyBuilder::new(host.into(), Arc::new(forwarder))
    }

    /// Builds a proxy from file configuration.
    pub fn from_config(config: &ProxyConfig, forwarder: Arc<dyn Forwarder>) -> Result<Self, ConfigError> {
        let add_headers = parse_header_pairs(&config.headers.add).map_err(ConfigError::InvalidHeader)?;

        let mut builder = CorsProxyBuilder::new(config.upstream.host.clone(), forwarder)
            .allow_from(config.cors.allow_from.clone())
            .legacy_origin_fallback(config.cors.legacy_origin_fallback)
            .constrained_servers(config.headers.constrained_servers.clone());
        builder.filter.add_headers = add_headers;

        if let Some(port) = config.upstream.port {
            builder = builder.port(port);
        }
        if let Some(proto) = &config.upstream.target_protocol {
            builder = builder.target_protocol(proto.clone());
        }
        if !config.auth.bearer_tokens.is_empty() {
            builder = builder.auth(BearerTokenAuth::new(
                config.auth.bearer_tokens.clone(),
                config.auth.deny_message.clone(),
            ));
        }

        Ok(builder.build())
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// The configured target protocol, normalized.
    ///
    /// `Ok(None)` means the inbound scheme is kept.
    pub fn target_protocol(&self) -> Result<Option<Protocol>, ProxyError> {
        self.target_protocol
            .load()
            .as_deref()
            .map(|raw| raw.parse::<Protocol>())
            .transpose()
    }

    /// Replaces the target protocol for subsequent requests.
    ///
    /// The value is validated when a request reads it, exactly like a
    /// constructor-supplied one. Requests already in flight may observe
    /// either value; ordering against them is up to the caller.
    pub fn set_target_protocol(&self, protocol: Option<&str>) {
        self.target_protocol
            .store(protocol.map(|p| Arc::new(p.to_string())));
    }

    /// The most recently rewritten request, if any request got that far.
    pub fn last_request(&self) -> Option<Arc<RequestMetadata>> {
        self.last_request.load_full()
    }

    pub fn cors_policy(&self) -> &CorsPolicy {
        &self.filter.cors
    }

    /// Handles one request.
    ///
    /// `start` receives the (filtered) status and headers exactly once
    /// before the body is returned.
    pub async fn handle(
        &self,
        mut request: RequestMetadata,
        body: Body,
        start: &mut dyn StartResponse,
    ) -> Result<Body, ProxyError> {
        let started = Instant::now();
        let method = request.method.clone();

        if let Some(auth) = &self.auth {
            if let AuthDecision::Deny(message) = auth.check(&request)? {
                tracing::info!(
                    method = %method,
                    path = %request.path,
                    with_message = message.is_some(),
                    "Request denied by authorization hook"
                );
                metrics::record_auth_denied();
                metrics::record_request(method.as_str(), StatusCode::UNAUTHORIZED.as_u16(), started);
                start.start(ResponseHead::new(StatusCode::UNAUTHORIZED, Vec::new()));
                return Ok(message.map(Body::from).unwrap_or_else(Body::empty));
            }
        }

        let target = self.target_protocol.load_full();
        let protocol = match rewrite::rewrite_request(&mut request, &self.upstream, target.as_deref().map(String::as_str)) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    scheme = %request.scheme,
                    target_protocol = ?target.as_deref(),
                    error = %e,
                    "Cannot rewrite request"
                );
                metrics::record_error(e.kind());
                return Err(e);
            }
        };

        tracing::debug!(
            method = %method,
            path = %request.path,
            protocol = %protocol,
            upstream = %self.upstream.authority(protocol),
            "Proxying request"
        );

        let origin = request.origin().cloned();
        let server_software = request.server_software.clone();
        let request = Arc::new(request);
        self.last_request.store(Some(request.clone()));

        let mut filtering = FilteringStart {
            inner: start,
            filter: &self.filter,
            origin: origin.as_ref(),
            server_software: &server_software,
            status: None,
        };

        let result = self.forwarder.forward(&request, body, &mut filtering).await;
        let status = filtering.status;

        match result {
            Ok(body) => match status {
                Some(status) => {
                    metrics::record_request(method.as_str(), status.as_u16(), started);
                    Ok(body)
                }
                None => {
                    tracing::error!("Forwarder returned without starting a response");
                    metrics::record_error(ProxyError::NoResponse.kind());
                    Err(ProxyError::NoResponse)
                }
            },
            Err(e) => {
                tracing::error!(
                    upstream = %self.upstream.authority(protocol),
                    error = %e,
                    "Upstream error"
                );
                metrics::record_error(e.kind());
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for CorsProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsProxy")
            .field("upstream", &self.upstream)
            .field("target_protocol", &self.target_protocol.load().as_deref())
            .field("auth", &self.auth.is_some())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Wraps the caller's `StartResponse` with the response header filter.
struct FilteringStart<'a> {
    inner: &'a mut dyn StartResponse,
    filter: &'a ResponseFilter,
    origin: Option<&'a HeaderValue>,
    server_software: &'a str,
    status: Option<StatusCode>,
}

impl StartResponse for FilteringStart<'_> {
    fn start(&mut self, head: ResponseHead) {
        let head = self.filter.apply(head, self.origin, self.server_software);
        self.status = Some(head.status);
        self.inner.start(head);
    }
}

/// Builder for [`CorsProxy`].
pub struct CorsProxyBuilder {
    upstream: Upstream,
    target_protocol: Option<String>,
    auth: Option<Arc<dyn AuthChecker>>,
    filter: ResponseFilter,
    forwarder: Arc<dyn Forwarder>,
}

impl CorsProxyBuilder {
    fn new(host: String, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            upstream: Upstream::new(host, None),
            target_protocol: None,
            auth: None,
            filter: ResponseFilter {
                constrained_servers: vec![WSGIREF_MARKER.to_string(), HYPER_MARKER.to_string()],
                ..Default::default()
            },
            forwarder,
        }
    }

    /// Explicit upstream port, used for both protocols.
    pub fn port(mut self, port: u16) -> Self {
        self.upstream.port = Some(port);
        self
    }

    /// Forces `http` or `https` upstream, in any casing.
    pub fn target_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.target_protocol = Some(protocol.into());
        self
    }

    pub fn auth(mut self, auth: impl AuthChecker + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Appends a response header. Order is preserved.
    pub fn add_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.filter.add_headers.push((name, value));
        self
    }

    pub fn allow_from(mut self, policy: CorsPolicy) -> Self {
        self.filter.cors = policy;
        self
    }

    /// Server identity substrings that require hop-by-hop stripping.
    pub fn constrained_servers(mut self, markers: Vec<String>) -> Self {
        self.filter.constrained_servers = markers;
        self
    }

    /// Inject the first allowed origin when an origin list has no match.
    pub fn legacy_origin_fallback(mut self, enabled: bool) -> Self {
        self.filter.legacy_origin_fallback = enabled;
        self
    }

    pub fn build(self) -> CorsProxy {
        CorsProxy {
            upstream: self.upstream,
            target_protocol: ArcSwapOption::from(self.target_protocol.map(Arc::new)),
            auth: self.auth,
            filter: self.filter,
            forwarder: self.forwarder,
            last_request: ArcSwapOption::empty(),
        }
    }
}
