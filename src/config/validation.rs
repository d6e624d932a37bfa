//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream host present, target protocol is http/https in any casing
//! - Configured headers are valid HTTP
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::proxy::protocol::Protocol;
use crate::security::cors::CorsPolicy;
use crate::security::headers::parse_header_pairs;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.host must not be empty")]
    MissingUpstreamHost,

    #[error("upstream.host {0:?} is not a valid host name")]
    InvalidUpstreamHost(String),

    #[error("upstream.target_protocol {0:?} must be http or https")]
    InvalidTargetProtocol(String),

    #[error("listener.scheme {0:?} must be http or https")]
    InvalidListenerScheme(String),

    #[error("{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("headers.add: {0}")]
    InvalidHeader(String),

    #[error("cors.allow_from contains an empty origin")]
    EmptyOrigin,

    #[error("auth.bearer_tokens contains an empty token")]
    EmptyToken,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.log_format {0:?} must be pretty or json")]
    InvalidLogFormat(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let host = config.upstream.host.trim();
    if host.is_empty() {
        errors.push(ValidationError::MissingUpstreamHost);
    } else if url::Host::parse(host).is_err() {
        errors.push(ValidationError::InvalidUpstreamHost(config.upstream.host.clone()));
    }

    if let Some(proto) = &config.upstream.target_protocol {
        if proto.parse::<Protocol>().is_err() {
            errors.push(ValidationError::InvalidTargetProtocol(proto.clone()));
        }
    }

    if config.listener.scheme.parse::<Protocol>().is_err() {
        errors.push(ValidationError::InvalidListenerScheme(config.listener.scheme.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(e) = parse_header_pairs(&config.headers.add) {
        errors.push(ValidationError::InvalidHeader(e));
    }

    if let CorsPolicy::Origins(origins) = &config.cors.allow_from {
        if origins.iter().any(|o| o.is_empty()) {
            errors.push(ValidationError::EmptyOrigin);
        }
    }

    if config.auth.bearer_tokens.iter().any(|t| t.is_empty()) {
        errors.push(ValidationError::EmptyToken);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(config.observability.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
