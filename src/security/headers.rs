//! Response header filtering.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers when the emitting server cannot relay them
//! - Append operator-configured headers
//! - Inject `Access-Control-Allow-Origin` per the CORS policy
//!
//! # Design Decisions
//! - Stripping is keyed on the server identity, not on the header source:
//!   configured headers on the deny-list are dropped as well
//! - Header order is preserved; configured headers follow upstream headers

use axum::http::{HeaderName, HeaderValue};

use crate::proxy::metadata::{HeaderList, ResponseHead};
use crate::security::cors::CorsPolicy;

/// Hop-by-hop headers a constrained server refuses to emit.
pub const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailers",
    "Transfer-Encoding",
    "Upgrade",
];

/// Identity marker of the reference constrained server.
pub const WSGIREF_MARKER: &str = "WSGIServer";

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Removes every hop-by-hop header from `headers`.
pub fn strip_hop_by_hop(headers: &mut HeaderList) {
    headers.retain(|(name, _)| !is_hop_by_hop(name.as_str()));
}

/// Post-processes upstream response heads.
#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    pub add_headers: HeaderList,
    pub cors: CorsPolicy,
    /// Substrings identifying servers that need hop-by-hop stripping.
    pub constrained_servers: Vec<String>,
    pub legacy_origin_fallback: bool,
}

impl ResponseFilter {
    /// True when `server_software` names a constrained server.
    pub fn is_constrained(&self, server_software: &str) -> bool {
        self.constrained_servers
            .iter()
            .any(|marker| !marker.is_empty() && server_software.contains(marker.as_str()))
    }

    /// Applies stripping, configured headers and CORS to `head`.
    pub fn apply(&self, mut head: ResponseHead, origin: Option<&HeaderValue>, server_software: &str) -> ResponseHead {
        head.headers.extend(self.add_headers.iter().cloned());

        if self.is_constrained(server_software) {
            strip_hop_by_hop(&mut head.headers);
        }

        if let Some(pair) = self.cors.header(origin, self.legacy_origin_fallback) {
            head.headers.push(pair);
        }

        head
    }
}

/// Parses configured `(name, value)` pairs into a header list.
pub fn parse_header_pairs(pairs: &[(String, String)]) -> Result<HeaderList, String> {
    pairs
        .iter()
        .map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header {name}"))?;
            Ok((name, value))
        })
        .collect()
}
