//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → CorsProxy::from_config / HttpServer::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the target protocol is the only
//!   field with a runtime setter (on `CorsProxy`)
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AuthConfig, CorsConfig, HeadersConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
