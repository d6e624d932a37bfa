//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from the validated configuration
//! - Build the proxy and bind the listener
//! - Serve until a termination signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Run the proxy with an already validated configuration.
pub async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_host = %config.upstream.host,
        upstream_port = ?config.upstream.port,
        target_protocol = ?config.upstream.target_protocol,
        cors = ?config.cors.allow_from,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let mut server_task = tokio::spawn(server.run(listener, server_shutdown));

    tokio::select! {
        result = &mut server_task => {
            // Server exited on its own, before any signal.
            result??;
            return Ok(());
        }
        _ = signals::wait_for_termination(&shutdown) => {}
    }
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
