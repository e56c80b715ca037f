//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, query string, bounded body read)
//!     → [handler → resolver → procedure]
//!     → response.rs (descriptor → http::Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{status, ResponseBody, ResponseDescriptor};
pub use server::GatewayServer;
