//! Authorization gate.
//! Consulted before any rewriting or forwarding; a denial short-circuits
//! the request with `401 Unauthorized`.

use axum::http::header;

use crate::error::ProxyError;
use crate::proxy::metadata::RequestMetadata;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Pass,
    /// Deny, optionally with a message used as the 401 body.
    Deny(Option<String>),
}

impl AuthDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, AuthDecision::Pass)
    }
}

impl From<bool> for AuthDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            AuthDecision::Pass
        } else {
            AuthDecision::Deny(None)
        }
    }
}

impl From<String> for AuthDecision {
    fn from(message: String) -> Self {
        AuthDecision::Deny(Some(message))
    }
}

impl From<&str> for AuthDecision {
    fn from(message: &str) -> Self {
        AuthDecision::Deny(Some(message.to_string()))
    }
}

/// Pluggable authorization hook.
///
/// Errors are fatal to the request and are never turned into a 401.
pub trait AuthChecker: Send + Sync {
    fn check(&self, request: &RequestMetadata) -> Result<AuthDecision, ProxyError>;
}

impl<F> AuthChecker for F
where
    F: Fn(&RequestMetadata) -> AuthDecision + Send + Sync,
{
    fn check(&self, request: &RequestMetadata) -> Result<AuthDecision, ProxyError> {
        Ok(self(request))
    }
}

/// Static bearer token check against the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerTokenAuth {
    tokens: Vec<String>,
    deny_message: Option<String>,
}

impl BearerTokenAuth {
    pub fn new(tokens: Vec<String>, deny_message: Option<String>) -> Self {
        Self {
            tokens,
            deny_message,
        }
    }
}

impl AuthChecker for BearerTokenAuth {
    fn check(&self, request: &RequestMetadata) -> Result<AuthDecision, ProxyError> {
        let auth_header = request
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        // No credentials at all: silent denial.
        let Some(auth_val) = auth_header else {
            return Ok(AuthDecision::Deny(None));
        };

        let presented = auth_val.strip_prefix("Bearer ").unwrap_or_default();
        if !presented.is_empty() && self.tokens.iter().any(|t| t == presented) {
            return Ok(AuthDecision::Pass);
        }

        Ok(AuthDecision::Deny(self.deny_message.clone()))
    }
}
