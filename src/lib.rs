//! Single-upstream HTTP forwarding proxy for local development.
//!
//! Every request accepted on the listening port is relayed to one fixed
//! upstream origin and the upstream's response is streamed back, changing
//! only connection-scoped headers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
