//! Request rewriting.
//!
//! Points inbound request metadata at the configured upstream:
//! - effective protocol: configured target protocol, else the inbound scheme
//! - secure marker set for https, cleared for http
//! - explicit port wins, else the protocol default
//! - `Host` is always `host:port`, even for default ports

use axum::http::{header, HeaderValue};

use crate::error::ProxyError;
use crate::proxy::metadata::RequestMetadata;
use crate::proxy::protocol::Protocol;

/// Fixed upstream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub host: String,
    /// Explicit port override. Used regardless of protocol.
    pub port: Option<u16>,
}

impl Upstream {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Port to use for the given protocol.
    pub fn port_for(&self, protocol: Protocol) -> u16 {
        self.port.unwrap_or_else(|| protocol.default_port())
    }

    /// Combined `host:port` authority.
    pub fn authority(&self, protocol: Protocol) -> String {
        format!("{}:{}", self.host, self.port_for(protocol))
    }
}

/// Resolves the protocol for a request.
///
/// Both inputs go through the same parser so casing is irrelevant.
pub fn resolve_protocol(target: Option<&str>, inbound_scheme: &str) -> Result<Protocol, ProxyError> {
    target.unwrap_or(inbound_scheme).parse()
}

/// Rewrites `request` in place to target `upstream`.
pub fn rewrite_request(
    request: &mut RequestMetadata,
    upstream: &Upstream,
    target: Option<&str>,
) -> Result<Protocol, ProxyError> {
    let protocol = resolve_protocol(target, &request.scheme)?;
    let authority = upstream.authority(protocol);
    let host = HeaderValue::from_str(&authority)
        .map_err(|_| ProxyError::InvalidUpstreamHost(authority))?;

    request.scheme = protocol.as_str().to_string();
    request.secure = protocol.is_secure();
    request.server_port = upstream.port_for(protocol);
    request.server_name = upstream.host.clone();
    request.headers.insert(header::HOST, host);

    Ok(protocol)
}
