//! Request resolution: from a matched route to a response descriptor.
//!
//! # Data Flow
//! ```text
//! Request + RouteMatch
//!     → query string + path params
//!     → negotiate.rs (body methods only)
//!     → merge (query < body < path params)
//!     → context factory
//!     → procedure invocation
//!     → Output → ResponseDescriptor
//! ```
//!
//! # Design Decisions
//! - Steps run strictly in order; each failure is classified at one boundary
//! - GET and DELETE never read the body
//! - A non-object body is rejected when path params must be merged into it
//! - Procedure panics are caught and reported like any other internal error

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::Request;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};

use crate::error::RpcError;
use crate::http::request::{parse_query, read_body};
use crate::http::response::{status, ResponseDescriptor, APPLICATION_JSON};
use crate::negotiate::{content_type, Negotiator};
use crate::procedure::{Call, HttpMethod, Kind, Output, ProcedureEntry};
use crate::routing::{Params, RouteMatch};

pub const NON_OBJECT_BODY: &str = "Non-object body is not allowed when path params are present";

/// Creates the per-request execution context from the request head.
pub type ContextFactory<C> = Arc<dyn Fn(&Parts) -> BoxFuture<'static, Result<C, RpcError>> + Send + Sync>;

/// Observes every failure caught by the resolver.
pub type ErrorHook<C> = Arc<dyn Fn(&ErrorEvent<'_, C>) + Send + Sync>;

/// What the error hook is told about a failure.
pub struct ErrorEvent<'a, C> {
    pub error: &'a RpcError,
    /// Present once the context factory succeeded.
    pub ctx: Option<&'a C>,
    /// Present once the input was assembled.
    pub input: Option<&'a Value>,
    pub path: &'a str,
    pub procedure: &'a str,
    pub kind: Kind,
    pub request: &'a Parts,
}

impl<C> fmt::Debug for ErrorEvent<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorEvent")
            .field("error", self.error)
            .field("input", &self.input)
            .field("path", &self.path)
            .field("procedure", &self.procedure)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// What has been built so far, for error reporting.
struct Progress<C> {
    ctx: Option<Arc<C>>,
    input: Option<Value>,
}

/// Runs one matched request through negotiation, merge, context and invocation.
pub struct Resolver<C> {
    negotiator: Negotiator,
    context: ContextFactory<C>,
    on_error: Option<ErrorHook<C>>,
    max_body_size: usize,
}

impl<C: Send + Sync + 'static> Resolver<C> {
    pub fn new(
        negotiator: Negotiator,
        context: ContextFactory<C>,
        on_error: Option<ErrorHook<C>>,
        max_body_size: usize,
    ) -> Self {
        Self {
            negotiator,
            context,
            on_error,
            max_body_size,
        }
    }

    /// Resolve a matched request. Never fails: errors become descriptors.
    pub async fn resolve(&self, request: Request<Body>, route: RouteMatch<'_, C>) -> ResponseDescriptor {
        let (head, body) = request.into_parts();
        let entry = route.entry;
        let path = head.uri.path().to_string();
        let mut progress = Progress {
            ctx: None,
            input: None,
        };

        match self
            .execute(&head, body, entry, &route.path_params, &path, &mut progress)
            .await
        {
            Ok(output) => into_descriptor(output),
            Err(error) => self.fail(&error, &head, &path, entry, progress),
        }
    }

    async fn execute(
        &self,
        head: &Parts,
        body: Body,
        entry: &ProcedureEntry<C>,
        params: &Params,
        path: &str,
        progress: &mut Progress<C>,
    ) -> Result<Output, RpcError> {
        let input = self.build_input(head, body, entry.method, params).await?;
        if self.on_error.is_some() {
            progress.input = Some(input.clone());
        }

        let ctx = Arc::new((self.context)(head).await?);
        progress.ctx = Some(Arc::clone(&ctx));

        let call = Call {
            ctx,
            input,
            path: path.to_string(),
            procedure: entry.name.clone(),
            kind: entry.kind,
        };

        tracing::debug!(procedure = %entry.name, kind = %entry.kind, "Invoking procedure");

        AssertUnwindSafe(async { entry.procedure.invoke(call).await })
            .catch_unwind()
            .await
            .map_err(RpcError::from_panic)?
    }

    async fn build_input(
        &self,
        head: &Parts,
        body: Body,
        method: HttpMethod,
        params: &Params,
    ) -> Result<Value, RpcError> {
        let query = parse_query(head.uri.query());

        if !method.reads_body() {
            return Ok(Value::Object(overlay(query, params)));
        }

        let parsed = self.negotiate(head, body).await?;
        merge_input(query, parsed, params)
    }

    async fn negotiate(&self, head: &Parts, body: Body) -> Result<Option<Value>, RpcError> {
        if let Some(parser) = self.negotiator.select(head) {
            tracing::trace!(parser = parser.name(), "Negotiated request body");
            let bytes = read_body(head, body, self.max_body_size).await?;
            return parser.parse(head, bytes);
        }

        if !self.negotiator.is_strict() {
            return Ok(None);
        }

        let bytes = read_body(head, body, self.max_body_size).await?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Err(RpcError::unsupported_media_type(format!(
                "Unsupported content type: {}",
                content_type(head).unwrap_or("none")
            )))
        }
    }

    fn fail(
        &self,
        error: &RpcError,
        head: &Parts,
        path: &str,
        entry: &ProcedureEntry<C>,
        progress: Progress<C>,
    ) -> ResponseDescriptor {
        if error.status() >= 500 {
            tracing::error!(procedure = %entry.name, code = %error.code(), error = %error, "Procedure failed");
        } else {
            tracing::warn!(procedure = %entry.name, code = %error.code(), error = %error, "Request rejected");
        }

        if let Some(hook) = &self.on_error {
            hook(&ErrorEvent {
                error,
                ctx: progress.ctx.as_deref(),
                input: progress.input.as_ref(),
                path,
                procedure: &entry.name,
                kind: entry.kind,
                request: head,
            });
        }

        error.to_descriptor()
    }
}

/// Copy `params` over `base`; path params win.
fn overlay(mut base: Map<String, Value>, params: &Params) -> Map<String, Value> {
    for (key, value) in params {
        base.insert(key.clone(), Value::String(value.clone()));
    }
    base
}

/// Merge query, negotiated body and path params for a body-carrying request.
pub fn merge_input(
    query: Map<String, Value>,
    body: Option<Value>,
    params: &Params,
) -> Result<Value, RpcError> {
    match body.filter(|value| !value.is_null()) {
        Some(Value::Object(fields)) => {
            let mut merged = query;
            merged.extend(fields);
            Ok(Value::Object(overlay(merged, params)))
        }
        Some(_) if !params.is_empty() => Err(RpcError::bad_request(NON_OBJECT_BODY)),
        Some(other) => Ok(other),
        None if query.is_empty() && params.is_empty() => Ok(Value::Null),
        None => Ok(Value::Object(overlay(query, params))),
    }
}

/// Convert a procedure's output into a descriptor.
pub fn into_descriptor(output: Output) -> ResponseDescriptor {
    match output {
        Output::Response(descriptor) => descriptor,
        Output::Value(Value::Null) => status(200),
        Output::Value(Value::String(text)) => status(200).raw_body(text),
        Output::Value(value @ (Value::Object(_) | Value::Array(_))) => {
            status(200).body(value.to_string(), APPLICATION_JSON)
        }
        Output::Value(scalar) => status(200).raw_body(scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn query(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_path_params_override_body() {
        let merged = merge_input(
            query(json!({ "id": "from-query", "q": "x" })),
            Some(json!({ "id": "from-body", "name": "neko" })),
            &params(&[("id", "from-path")]),
        )
        .unwrap();
        assert_eq!(merged, json!({ "id": "from-path", "name": "neko", "q": "x" }));
    }

    #[test]
    fn test_non_object_body_with_params_rejected() {
        let err = merge_input(Map::new(), Some(json!([1, 2])), &params(&[("id", "1")])).unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), NON_OBJECT_BODY);

        let err = merge_input(Map::new(), Some(json!("text")), &params(&[("id", "1")])).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_non_object_body_without_params_passes_through() {
        let merged = merge_input(query(json!({ "q": "1" })), Some(json!([1, 2])), &Params::new()).unwrap();
        assert_eq!(merged, json!([1, 2]));
    }

    #[test]
    fn test_absent_body() {
        assert_eq!(merge_input(Map::new(), None, &Params::new()).unwrap(), Value::Null);
        assert_eq!(
            merge_input(Map::new(), None, &params(&[("id", "7")])).unwrap(),
            json!({ "id": "7" })
        );
    }

    #[test]
    fn test_null_body_is_absent() {
        assert_eq!(
            merge_input(Map::new(), Some(Value::Null), &params(&[("id", "7")])).unwrap(),
            json!({ "id": "7" })
        );
        assert_eq!(merge_input(Map::new(), Some(Value::Null), &Params::new()).unwrap(), Value::Null);
    }

    #[test]
    fn test_output_serialization() {
        let json_out = into_descriptor(Output::Value(json!({ "a": 1 })));
        assert_eq!(json_out.status_code(), 200);
        assert_eq!(json_out.header_value("content-type"), Some(APPLICATION_JSON));

        let text_out = into_descriptor(Output::from("neko"));
        assert!(text_out.header_value("content-type").is_none());
        assert_eq!(text_out.body_ref().map(|b| b.as_bytes()), Some(&b"neko"[..]));

        let number_out = into_descriptor(Output::Value(json!(3)));
        assert_eq!(number_out.body_ref().map(|b| b.as_bytes()), Some(&b"3"[..]));

        let empty = into_descriptor(Output::Value(Value::Null));
        assert!(empty.body_ref().is_none());

        let explicit = status(201).header("X-Custom", "1");
        assert_eq!(into_descriptor(Output::Response(explicit.clone())), explicit);
    }
}
