//! The externally visible entry point.
//!
//! # Responsibilities
//! - Build the route table from a procedure tree (once)
//! - Take one request, find its procedure, return one response
//! - Produce the fixed 404 for unknown routes without touching the resolver
//!
//! # Design Decisions
//! - `RestHandler` is cheap to clone; all state sits behind one `Arc`
//! - Nothing is mutated after `build()`
//! - Method mismatch answers 404 unless `method_not_allowed` is enabled

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, Request, Response};
use axum::response::IntoResponse;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use tracing::Instrument;

use crate::error::{RpcError, SetupError};
use crate::http::request::request_id;
use crate::http::response::{status, TEXT_PLAIN};
use crate::negotiate::{ContentParser, Negotiator};
use crate::observability::metrics;
use crate::procedure::{flatten, HttpMethod, ProcedureEntry, ProcedureTree};
use crate::resolver::{ContextFactory, ErrorEvent, ErrorHook, Resolver};
use crate::routing::{RouteLookup, RouteTable};

pub const NOT_FOUND_BODY: &str = "Endpoint not found";
pub const METHOD_NOT_ALLOWED_BODY: &str = "Method not allowed";

/// Behaviour switches for a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Reject non-empty bodies no parser understands with 415.
    pub strict_content_type: bool,
    /// Answer 405 (with `Allow`) instead of 404 when only the method is wrong.
    pub method_not_allowed: bool,
    /// Maximum buffered request body, in bytes.
    pub max_body_size: usize,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            strict_content_type: false,
            method_not_allowed: false,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

struct Inner<C> {
    routes: RouteTable<C>,
    resolver: Resolver<C>,
    options: HandlerOptions,
}

/// Serves a procedure tree over REST-style HTTP.
pub struct RestHandler<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for RestHandler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for RestHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestHandler")
            .field("routes", &self.inner.routes.len())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl<C: Default + Send + Sync + 'static> RestHandler<C> {
    /// Start configuring a handler. Without a context factory every request
    /// gets `C::default()`.
    pub fn builder(tree: ProcedureTree<C>) -> RestHandlerBuilder<C> {
        RestHandlerBuilder {
            tree,
            context: Arc::new(|_: &Parts| -> BoxFuture<'static, Result<C, RpcError>> {
                future::ready(Ok(C::default())).boxed()
            }),
            parsers: Vec::new(),
            on_error: None,
            options: HandlerOptions::default(),
        }
    }

    /// Build a handler with default options.
    pub fn new(tree: ProcedureTree<C>) -> Result<Self, SetupError> {
        Self::builder(tree).build()
    }
}

impl<C: Send + Sync + 'static> RestHandler<C> {
    /// Handle one request.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let request_id = request_id(request.headers());
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let span = tracing::info_span!(
            "rest_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        async move {
            let (response, procedure) = self.dispatch(request, &path).await;
            let status = response.status().as_u16();
            tracing::debug!(status, "Request completed");
            metrics::record_request(&method, procedure.unwrap_or("none"), status, start);
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, request: Request<Body>, path: &str) -> (Response<Body>, Option<&str>) {
        let Ok(method) = HttpMethod::try_from(request.method()) else {
            tracing::debug!("Unsupported method");
            return (not_found(), None);
        };

        match self.inner.routes.resolve(method, path) {
            RouteLookup::Found(route) => {
                let entry = route.entry;
                tracing::debug!(procedure = %entry.name, "Dispatching to procedure");
                let descriptor = self.inner.resolver.resolve(request, route).await;
                (descriptor.into_response(), Some(entry.name.as_str()))
            }
            RouteLookup::MethodNotAllowed(allowed) if self.inner.options.method_not_allowed => {
                tracing::debug!(?allowed, "Method not allowed");
                (method_not_allowed(&allowed), None)
            }
            _ => {
                tracing::debug!("No route matched");
                (not_found(), None)
            }
        }
    }

    /// Registered procedures, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &ProcedureEntry<C>> {
        self.inner.routes.entries()
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.inner.options
    }
}

fn not_found() -> Response<Body> {
    status(404).body(NOT_FOUND_BODY, TEXT_PLAIN).into_response()
}

fn method_not_allowed(allowed: &[HttpMethod]) -> Response<Body> {
    let allow = allowed
        .iter()
        .map(HttpMethod::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    status(405)
        .header(header::ALLOW.as_str(), allow)
        .body(METHOD_NOT_ALLOWED_BODY, TEXT_PLAIN)
        .into_response()
}

/// Configures and builds a `RestHandler`.
pub struct RestHandlerBuilder<C> {
    tree: ProcedureTree<C>,
    context: ContextFactory<C>,
    parsers: Vec<Arc<dyn ContentParser>>,
    on_error: Option<ErrorHook<C>>,
    options: HandlerOptions,
}

impl<C: Send + Sync + 'static> RestHandlerBuilder<C> {
    /// Create the execution context for each request from its head.
    pub fn context<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(&Parts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, RpcError>> + Send + 'static,
    {
        self.context = Arc::new(move |head: &Parts| -> BoxFuture<'static, Result<C, RpcError>> {
            factory(head).boxed()
        });
        self
    }

    /// Add a body parser, consulted before the built-in ones.
    pub fn content_parser(mut self, parser: impl ContentParser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Observe every failure the resolver catches.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ErrorEvent<'_, C>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Flatten the tree and register every procedure.
    pub fn build(self) -> Result<RestHandler<C>, SetupError> {
        let routes = RouteTable::build(flatten(&self.tree)?)?;

        for entry in routes.entries() {
            tracing::debug!(
                method = %entry.method,
                path = %entry.path,
                procedure = %entry.name,
                kind = %entry.kind,
                "Registered procedure"
            );
        }
        tracing::info!(routes = routes.len(), "Route table built");

        let negotiator = Negotiator::new(self.parsers, self.options.strict_content_type);
        let resolver = Resolver::new(
            negotiator,
            self.context,
            self.on_error,
            self.options.max_body_size,
        );

        Ok(RestHandler {
            inner: Arc::new(Inner {
                routes,
                resolver,
                options: self.options,
            }),
        })
    }
}
