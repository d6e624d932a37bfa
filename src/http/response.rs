//! Response handling and transformation.
//!
//! # Responsibilities
//! - Capture the status and headers the pipeline starts the response with
//! - Assemble the final `Response` without reordering or merging headers
//! - Map pipeline errors to HTTP status codes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - Invalid protocol or a failing auth hook is a server fault (500);
//!   transport failures are 502

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::proxy::{ResponseHead, StartResponse};

/// `StartResponse` that keeps the head for later assembly.
#[derive(Debug, Default)]
pub struct CapturedResponse {
    head: Option<ResponseHead>,
}

impl CapturedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Combine the captured head with `body`.
    pub fn into_response(self, body: Body) -> Result<Response, ProxyError> {
        let head = self.head.ok_or(ProxyError::NoResponse)?;

        let mut response = Response::new(body);
        *response.status_mut() = head.status;
        let headers = response.headers_mut();
        for (name, value) in head.headers {
            headers.append(name, value);
        }
        Ok(response)
    }
}

impl StartResponse for CapturedResponse {
    fn start(&mut self, head: ResponseHead) {
        if self.head.is_some() {
            tracing::warn!(status = %head.status, "Response already started, ignoring");
            return;
        }
        self.head = Some(head);
    }
}

/// Status code for a fatal pipeline error.
pub fn error_status(error: &ProxyError) -> StatusCode {
    match error {
        ProxyError::InvalidProtocol(_)
        | ProxyError::InvalidUpstreamHost(_)
        | ProxyError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ProxyError::RequestBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
        ProxyError::Upstream(_) | ProxyError::UpstreamUrl(_) | ProxyError::NoResponse => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = error_status(&self);
        let body = match status {
            StatusCode::BAD_GATEWAY => "Upstream request failed",
            StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
            _ => "Proxy misconfigured",
        };
        (status, body).into_response()
    }
}
