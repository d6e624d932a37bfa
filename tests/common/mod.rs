//! Shared utilities for pipeline and end-to-end tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use cors_proxy::proxy::{Forwarder, HeaderList, RequestMetadata, ResponseHead, StartResponse};
use cors_proxy::ProxyError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Test double for the upstream exchange.
///
/// Records every request it is handed and answers with a fixed head and body.
#[derive(Clone)]
pub struct RecordingForwarder {
    status: StatusCode,
    headers: HeaderList,
    body: &'static str,
    seen: Arc<Mutex<Vec<RequestMetadata>>>,
}

#[allow(dead_code)]
impl RecordingForwarder {
    pub fn new() -> Self {
        Self::with_response(StatusCode::OK, Vec::new(), "Success!")
    }

    pub fn with_response(status: StatusCode, headers: HeaderList, body: &'static str) -> Self {
        Self {
            status,
            headers,
            body,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// The request metadata of the most recent call.
    pub fn last(&self) -> RequestMetadata {
        self.seen
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("forwarder was never called")
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(
        &self,
        request: &RequestMetadata,
        _body: Body,
        start: &mut dyn StartResponse,
    ) -> Result<Body, ProxyError> {
        self.seen.lock().unwrap().push(request.clone());
        start.start(ResponseHead::new(self.status, self.headers.clone()));
        Ok(Body::from(self.body))
    }
}

/// Forwarder that always fails at the transport level.
#[allow(dead_code)]
pub struct FailingForwarder;

#[async_trait]
impl Forwarder for FailingForwarder {
    async fn forward(
        &self,
        _request: &RequestMetadata,
        _body: Body,
        _start: &mut dyn StartResponse,
    ) -> Result<Body, ProxyError> {
        Err(ProxyError::NoResponse)
    }
}

/// Approximation of what a WSGI reference server hands the proxy.
#[allow(dead_code)]
pub fn default_request() -> RequestMetadata {
    let mut req = RequestMetadata::new("http", "localhost", 80);
    req.server_software = "WSGIServer/0.1 Python/2.7.11+".to_string();
    req.remote_addr = Some("127.0.0.1:50000".parse().unwrap());
    req.headers.insert(header::HOST, HeaderValue::from_static("localhost:80"));
    req.headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    req.headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/7.47.0"));
    req
}

/// The eight hop-by-hop headers with arbitrary values.
#[allow(dead_code)]
pub fn banned_headers() -> HeaderList {
    [
        ("connection", "My-Value"),
        ("keep-alive", "False"),
        ("proxy-authenticate", "Nope"),
        ("proxy-authorization", "Not here"),
        ("te", "what"),
        ("trailers", "None"),
        ("transfer-encoding", "Nothing"),
        ("upgrade", "Dont"),
    ]
    .into_iter()
    .map(|(n, v)| (HeaderName::from_static(n), HeaderValue::from_static(v)))
    .collect()
}

/// Start a mock backend on an ephemeral port.
///
/// Replies `200 OK` with `body`, echoing the received `Host` header as
/// `X-Seen-Host` and adding `X-Upstream: mock`.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let head = read_request_head(&mut socket).await;
                let seen_host = head
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("host").then(|| value.trim().to_string())
                    })
                    .unwrap_or_default();

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Upstream: mock\r\nX-Seen-Host: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    seen_host,
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
