//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! proxy pipeline + HTTP server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the trace span of every request
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
