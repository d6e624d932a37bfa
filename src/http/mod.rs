//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, Request → RequestMetadata)
//!     → proxy::CorsProxy::handle
//!     → response.rs (captured head + body → Response, error mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::CapturedResponse;
pub use server::HttpServer;
