//! CORS proxy binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http::server ─▶ access_control ─▶ rewrite  │
//!                           │                                      │       │
//!                           │                                      ▼       │
//!     Client Response       │                                  forward ────┼──▶ Upstream
//!     ◀─────────────────────┼── http::response ◀── headers + cors ◀─┘      │
//!                           └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use cors_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use cors_proxy::lifecycle::startup;

#[derive(Parser, Debug)]
#[command(name = "cors-proxy")]
#[command(about = "Rewriting proxy that adds CORS headers in front of one upstream", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream host, overrides `upstream.host`.
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream port, overrides `upstream.port`.
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Force `http` or `https` towards the upstream.
    #[arg(long)]
    target_protocol: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(host) = self.upstream_host {
            config.upstream.host = host;
        }
        if let Some(port) = self.upstream_port {
            config.upstream.port = Some(port);
        }
        if let Some(proto) = self.target_protocol {
            config.upstream.target_protocol = Some(proto);
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    startup::run(config).await
}
