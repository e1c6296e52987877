//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept, optional connection cap)
//!     → connection.rs (id assignment, live-connection tracking)
//!     → Hand off to HTTP layer (one task per connection)
//! ```
//!
//! # Design Decisions
//! - Bind failures are fatal; accept failures are logged and survived
//! - Each connection is tracked so shutdown can drain in-flight requests
//! - The connection cap is optional; by default only the OS limits apply

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
