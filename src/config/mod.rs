//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line / DEV_RELAY_* environment
//!     → cli.rs (parse arguments)
//!     → schema.rs (typed ProxyConfig with defaults)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ProxyConfig (validated, immutable)
//!     → handed by value to the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload and no config file
//! - All fields have defaults so `dev-relay` with no arguments works
//! - Validation separates syntactic (clap) from semantic checks

pub mod cli;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use schema::{ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, TimeoutConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};
