//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handler and resolver produce:
//!     → logging.rs (structured log events, one span per request)
//!     → metrics.rs (request counters, latency histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the request span
//! - Metrics are cheap (no-op until a recorder is installed)

pub mod logging;
pub mod metrics;
