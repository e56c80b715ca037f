//! REST adaptor for RPC procedure trees.
//!
//! Exposes a tree of typed procedures (queries, mutations, subscriptions) as
//! conventional HTTP endpoints: each procedure declares a method and a path
//! pattern, requests are matched, their input is assembled from the query
//! string, the negotiated body and path parameters, and the procedure's result
//! is serialized into an HTTP response.

// Core
pub mod error;
pub mod handler;
pub mod negotiate;
pub mod procedure;
pub mod resolver;
pub mod routing;

// Transport
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{ErrorCode, RpcError, SetupError};
pub use handler::{HandlerOptions, RestHandler, RestHandlerBuilder};
pub use http::response::{status, ResponseDescriptor};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use negotiate::{ContentParser, FormUrlEncodedParser, JsonParser, TextPlainParser};
pub use procedure::{Call, HttpMethod, Kind, Output, Procedure, ProcedureResult, ProcedureTree, RestMeta};
pub use resolver::ErrorEvent;
