//! Errors raised while proxying a single request.

use thiserror::Error;

/// Fatal per-request errors.
///
/// Authorization denial is not an error: it is a regular 401 response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The resolved scheme is neither `http` nor `https`.
    #[error("invalid protocol {0:?}: expected http or https")]
    InvalidProtocol(String),

    /// The upstream host cannot be written into a `Host` header.
    #[error("invalid upstream host {0:?}")]
    InvalidUpstreamHost(String),

    /// The authorization hook itself failed.
    #[error("authorization check failed: {0}")]
    Auth(String),

    /// The upstream exchange failed at the transport level.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The rewritten request metadata does not form a valid upstream URL.
    #[error("invalid upstream url: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    /// The inbound request body could not be read.
    #[error("failed to read request body: {0}")]
    RequestBody(String),

    /// The forwarder returned without starting a response.
    #[error("upstream produced no response")]
    NoResponse,
}

impl ProxyError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidProtocol(_) => "invalid_protocol",
            ProxyError::InvalidUpstreamHost(_) => "invalid_upstream_host",
            ProxyError::Auth(_) => "auth",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::UpstreamUrl(_) => "upstream_url",
            ProxyError::RequestBody(_) => "request_body",
            ProxyError::NoResponse => "no_response",
        }
    }
}
