//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one span per relayed request)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated strings, for machine parsing
//! - Relay IDs exist in logs only; they are not injected into traffic
//! - Metric calls are no-ops unless an exporter is installed

pub mod logging;
pub mod metrics;
