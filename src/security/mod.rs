//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (AuthChecker; deny → 401)
//! Upstream response:
//!     → headers.rs (hop-by-hop stripping, configured headers)
//!     → cors.rs (Access-Control-Allow-Origin)
//! ```
//!
//! # Design Decisions
//! - Denial is a normal response, never an error
//! - CORS origin matching is exact and case-sensitive

pub mod access_control;
pub mod cors;
pub mod headers;

pub use access_control::{AuthChecker, AuthDecision, BearerTokenAuth};
pub use cors::CorsPolicy;
pub use headers::ResponseFilter;
