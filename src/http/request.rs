//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on the response
//! - Translate an inbound `Request` into `RequestMetadata`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound scheme is what the listener reports, unless
//!   `X-Forwarded-Proto` is explicitly trusted; it is not validated here
//!   so a bad value surfaces from the rewriter like any other

use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ListenerConfig;
use crate::proxy::metadata::RequestMetadata;

/// Header carrying the request ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header consulted when `trust_forwarded_proto` is enabled.
pub static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Layer assigning an `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid)
}

/// Layer copying `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID.clone())
}

/// Request ID of an inbound request, or `"unknown"`.
pub fn request_id(parts: &Parts) -> &str {
    parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Builds pipeline metadata from an inbound request.
pub fn metadata_from_parts(
    parts: &Parts,
    remote_addr: Option<SocketAddr>,
    local_addr: SocketAddr,
    listener: &ListenerConfig,
) -> RequestMetadata {
    let forwarded = listener
        .trust_forwarded_proto
        .then(|| parts.headers.get(&X_FORWARDED_PROTO))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    let scheme = forwarded
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or(listener.scheme.as_str())
        .to_string();

    let (server_name, server_port) = server_address(parts, local_addr);

    RequestMetadata {
        method: parts.method.clone(),
        version: parts.version,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        secure: scheme.eq_ignore_ascii_case("https"),
        scheme,
        server_name,
        server_port,
        server_software: listener.server_software.clone(),
        remote_addr,
        headers: parts.headers.clone(),
    }
}

/// Server name and port from the URI authority, the `Host` header, or the
/// local socket, in that order.
fn server_address(parts: &Parts, local_addr: SocketAddr) -> (String, u16) {
    let authority = parts.uri.authority().cloned().or_else(|| {
        parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.parse().ok())
    });

    match authority {
        Some(a) => (
            a.host().to_string(),
            a.port_u16().unwrap_or(local_addr.port()),
        ),
        None => (local_addr.ip().to_string(), local_addr.port()),
    }
}
