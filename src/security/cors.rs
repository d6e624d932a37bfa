//! CORS `Access-Control-Allow-Origin` policy.

use axum::http::{header, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// Which origins may read proxied responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "AllowFrom", into = "AllowFrom")]
pub enum CorsPolicy {
    /// Never add the header.
    #[default]
    Disabled,
    /// Echo the request origin, or `*` when no origin was sent.
    Any,
    /// Echo the request origin; nothing when no origin was sent.
    EchoOrigin,
    /// Echo the request origin only on an exact, case-sensitive match.
    Origins(Vec<String>),
}

impl CorsPolicy {
    /// Value for `Access-Control-Allow-Origin`, if one should be sent.
    ///
    /// `legacy_fallback` injects the first configured origin when an origin
    /// list has no match, for clients depending on that older behaviour.
    pub fn allow_origin(&self, origin: Option<&HeaderValue>, legacy_fallback: bool) -> Option<HeaderValue> {
        match (self, origin) {
            (CorsPolicy::Disabled, _) => None,
            (CorsPolicy::Any, None) => Some(HeaderValue::from_static("*")),
            (CorsPolicy::Any | CorsPolicy::EchoOrigin, Some(o)) => Some(o.clone()),
            (CorsPolicy::EchoOrigin, None) => None,
            (CorsPolicy::Origins(allowed), Some(o)) => {
                if allowed.iter().any(|a| a.as_bytes() == o.as_bytes()) {
                    Some(o.clone())
                } else if legacy_fallback {
                    allowed.first().and_then(|a| HeaderValue::from_str(a).ok())
                } else {
                    None
                }
            }
            (CorsPolicy::Origins(_), None) => None,
        }
    }

    /// The header pair to append, if any.
    pub fn header(&self, origin: Option<&HeaderValue>, legacy_fallback: bool) -> Option<(HeaderName, HeaderValue)> {
        self.allow_origin(origin, legacy_fallback)
            .map(|v| (header::ACCESS_CONTROL_ALLOW_ORIGIN, v))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CorsPolicy::Disabled)
    }
}

/// Wire form of `allow_from`: `true`, `false`, `"*"`, `"origin"` or a list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum AllowFrom {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl From<AllowFrom> for CorsPolicy {
    fn from(raw: AllowFrom) -> Self {
        match raw {
            AllowFrom::Flag(true) => CorsPolicy::Any,
            AllowFrom::Flag(false) => CorsPolicy::Disabled,
            AllowFrom::One(s) if s == "*" => CorsPolicy::EchoOrigin,
            AllowFrom::One(s) => CorsPolicy::Origins(vec![s]),
            AllowFrom::Many(list) => CorsPolicy::Origins(list),
        }
    }
}

impl From<CorsPolicy> for AllowFrom {
    fn from(policy: CorsPolicy) -> Self {
        match policy {
            CorsPolicy::Disabled => AllowFrom::Flag(false),
            CorsPolicy::Any => AllowFrom::Flag(true),
            CorsPolicy::EchoOrigin => AllowFrom::One("*".to_string()),
            CorsPolicy::Origins(list) => AllowFrom::Many(list),
        }
    }
}
