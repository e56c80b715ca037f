//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Vec<ProcedureEntry>
//!     → matcher.rs (normalize, compile `:name` patterns)
//!     → router.rs (one radix tree per method)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, path)
//!     → router.rs (normalize + lowercase, tree lookup)
//!     → matcher.rs (capture parameters from the original path)
//!     → Return: Found | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Case-insensitive, trailing-slash tolerant matching
//! - Static segments win over parameters at the same position

pub mod matcher;
pub mod router;

pub use matcher::{normalize_path, Params};
pub use router::{RouteLookup, RouteMatch, RouteTable};
