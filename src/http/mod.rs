//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (one task each)
//!     → server.rs (hyper connection, axum router, relay span)
//!     → relay.rs (rebuild request for upstream, bounded send)
//!     → headers.rs (hop-by-hop / Host / server banner rules)
//!     → response.rs (stream upstream body back, lifecycle bookkeeping)
//!     → error.rs (502 / 500 for failures)
//!     → Send to client
//! ```

pub mod error;
pub mod headers;
pub mod relay;
pub mod response;
pub mod server;

pub use error::{RelayError, ServerError};
pub use relay::Upstream;
pub use response::{RelayContext, RelayPhase};
pub use server::HttpServer;
