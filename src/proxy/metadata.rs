//! Per-request data passed through the pipeline.

use std::fmt;
use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};

/// Ordered response header list. Order and duplicates are preserved.
pub type HeaderList = Vec<(HeaderName, HeaderValue)>;

/// Addressing and header metadata of one inbound request.
///
/// The rewriter mutates `scheme`, `secure`, `server_name`, `server_port`
/// and the `Host` header in place; every other field passes through.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub method: Method,
    pub version: Version,
    /// Path component, always starting with `/`.
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Scheme as reported by the embedding server, not yet normalized.
    pub scheme: String,
    /// Secure-transport marker. `false` means the marker is absent.
    pub secure: bool,
    pub server_name: String,
    pub server_port: u16,
    /// Identity string of the server that will emit the response.
    pub server_software: String,
    pub remote_addr: Option<SocketAddr>,
    pub headers: HeaderMap,
}

impl RequestMetadata {
    /// Metadata for a `GET /` request with no headers.
    pub fn new(scheme: impl Into<String>, server_name: impl Into<String>, server_port: u16) -> Self {
        Self {
            method: Method::GET,
            version: Version::HTTP_11,
            path: "/".to_string(),
            query: None,
            scheme: scheme.into(),
            secure: false,
            server_name: server_name.into(),
            server_port,
            server_software: String::new(),
            remote_addr: None,
            headers: HeaderMap::new(),
        }
    }

    /// The `Origin` request header, if sent.
    pub fn origin(&self) -> Option<&HeaderValue> {
        self.headers.get(header::ORIGIN)
    }

    /// The combined `Host` header, if present and valid UTF-8.
    pub fn host_header(&self) -> Option<&str> {
        self.headers.get(header::HOST).and_then(|v| v.to_str().ok())
    }

    /// Path plus query, as sent on the request line.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

/// Status and headers captured from the upstream before release to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderList,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: HeaderList) -> Self {
        Self { status, headers }
    }

    /// The status line, e.g. `401 Unauthorized`.
    pub fn status_line(&self) -> String {
        StatusLine(self.status).to_string()
    }

    /// First value of the named header.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

struct StatusLine(StatusCode);

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.canonical_reason() {
            Some(reason) => write!(f, "{} {}", self.0.as_u16(), reason),
            None => write!(f, "{}", self.0.as_u16()),
        }
    }
}
