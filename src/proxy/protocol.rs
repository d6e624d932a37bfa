//! Upstream protocol selection.
//!
//! Every scheme string the proxy sees (configured target protocol, runtime
//! override, inbound scheme) is parsed here and nowhere else, so casing can
//! never make two code paths disagree.

use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;

/// Protocol spoken to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Canonical lowercase scheme.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Port used when none is configured explicitly.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Https)
    }
}

impl FromStr for Protocol {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Protocol::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Protocol::Https)
        } else {
            Err(ProxyError::InvalidProtocol(s.to_string()))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
