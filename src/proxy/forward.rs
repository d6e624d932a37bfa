//! Upstream forwarding.
//!
//! The forwarder is the only component doing network I/O. It receives the
//! rewritten metadata, reports the upstream status and headers through a
//! [`StartResponse`] exactly once, then hands back the body untouched.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap};
use url::Url;

use crate::error::ProxyError;
use crate::proxy::metadata::{RequestMetadata, ResponseHead};
use crate::security::headers::is_hop_by_hop;

/// Response-start callback.
pub trait StartResponse: Send {
    fn start(&mut self, head: ResponseHead);
}

impl<F> StartResponse for F
where
    F: FnMut(ResponseHead) + Send,
{
    fn start(&mut self, head: ResponseHead) {
        self(head)
    }
}

/// Performs the upstream exchange.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        request: &RequestMetadata,
        body: Body,
        start: &mut dyn StartResponse,
    ) -> Result<Body, ProxyError>;
}

/// Builds the upstream URL from rewritten metadata.
pub fn upstream_url(request: &RequestMetadata) -> Result<Url, ProxyError> {
    let url = format!(
        "{}://{}:{}{}",
        request.scheme,
        request.server_name,
        request.server_port,
        request.path_and_query()
    );
    Ok(Url::parse(&url)?)
}

/// Request headers to send upstream: everything except hop-by-hop headers.
///
/// `Host` is kept as rewritten so the upstream sees `host:port`.
pub fn upstream_headers(request: &RequestMetadata) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in request.headers.iter() {
        if is_hop_by_hop(name.as_str()) || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// HTTP(S) forwarder backed by `reqwest`.
///
/// Request bodies are buffered up to `max_body_bytes` before sending;
/// response bodies are streamed back.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpForwarder {
    pub fn new(connect_timeout: Duration, max_body_bytes: usize) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self::with_client(client, max_body_bytes))
    }

    pub fn with_client(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        request: &RequestMetadata,
        body: Body,
        start: &mut dyn StartResponse,
    ) -> Result<Body, ProxyError> {
        let url = upstream_url(request)?;
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| ProxyError::RequestBody(e.to_string()))?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            "Forwarding upstream"
        );

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(upstream_headers(request))
            .body(body)
            .send()
            .await?;

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        start.start(ResponseHead::new(response.status(), headers));

        Ok(Body::from_stream(response.bytes_stream()))
    }
}
