//! Procedure tree model.
//!
//! # Data Flow
//! ```text
//! ProcedureTree (nested groups, built by the application)
//!     → flatten.rs (one pass, explicit accumulator)
//!     → Vec<ProcedureEntry> (method + normalized path per leaf)
//!     → routing::RouteTable (registered once, read-only afterwards)
//! ```
//!
//! # Design Decisions
//! - Nodes are an explicit `Group | Leaf` enum; no shape sniffing
//! - Procedures return `Output::Value` or `Output::Response`, never a guessed shape
//! - The execution context is opaque to the core and shared as `Arc<C>`

pub mod flatten;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::RpcError;
use crate::http::response::ResponseDescriptor;

pub use flatten::{flatten, ProcedureEntry};

/// Procedure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Query,
    Mutation,
    Subscription,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Query => "query",
            Kind::Mutation => "mutation",
            Kind::Subscription => "subscription",
        }
    }

    /// Method used when a procedure declares none.
    pub fn default_method(&self) -> HttpMethod {
        match self {
            Kind::Query | Kind::Subscription => HttpMethod::Get,
            Kind::Mutation => HttpMethod::Post,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The HTTP methods a procedure can be exposed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// GET and DELETE requests never contribute a body to the input.
    pub fn reads_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<&Method> for HttpMethod {
    type Error = UnsupportedMethod;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(HttpMethod::Get),
            Method::POST => Ok(HttpMethod::Post),
            Method::PUT => Ok(HttpMethod::Put),
            Method::PATCH => Ok(HttpMethod::Patch),
            Method::DELETE => Ok(HttpMethod::Delete),
            Method::HEAD => Ok(HttpMethod::Head),
            Method::OPTIONS => Ok(HttpMethod::Options),
            _ => Err(UnsupportedMethod(method.to_string())),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// REST exposure metadata attached to a procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestMeta {
    /// Explicit method; defaults by kind when absent.
    pub method: Option<HttpMethod>,
    /// Explicit path; a leading `/` makes it absolute.
    pub path: Option<String>,
}

impl RestMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// What a procedure returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A plain value, serialized by the resolver.
    Value(Value),
    /// An explicit response, passed through untouched.
    Response(ResponseDescriptor),
}

impl Output {
    /// Serialize any value into `Output::Value`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, RpcError> {
        serde_json::to_value(value)
            .map(Output::Value)
            .map_err(|e| RpcError::internal(format!("failed to serialize output: {e}")))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Output::Response(_))
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl From<ResponseDescriptor> for Output {
    fn from(response: ResponseDescriptor) -> Self {
        Output::Response(response)
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Value(Value::String(text))
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Output::Value(Value::String(text.to_string()))
    }
}

pub type ProcedureResult = Result<Output, RpcError>;

/// Everything a procedure receives for one invocation.
pub struct Call<C> {
    pub ctx: Arc<C>,
    /// Merged input (query, body, path parameters).
    pub input: Value,
    /// Request path as received.
    pub path: String,
    /// Dotted name of the procedure in the tree.
    pub procedure: String,
    pub kind: Kind,
}

impl<C> Call<C> {
    /// Deserialize the merged input; failures are client errors.
    pub fn parse_input<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        T::deserialize(&self.input).map_err(|e| RpcError::bad_request(format!("Invalid input: {e}")))
    }
}

impl<C> fmt::Debug for Call<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("input", &self.input)
            .field("path", &self.path)
            .field("procedure", &self.procedure)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

type HandlerFn<C> = dyn Fn(Call<C>) -> BoxFuture<'static, ProcedureResult> + Send + Sync;

/// A leaf of the procedure tree.
pub struct Procedure<C> {
    kind: Kind,
    meta: RestMeta,
    handler: Arc<HandlerFn<C>>,
}

impl<C: Send + Sync + 'static> Procedure<C> {
    /// Create a procedure of the given kind from an async handler.
    pub fn new<F, Fut>(kind: Kind, handler: F) -> Self
    where
        F: Fn(Call<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self {
            kind,
            meta: RestMeta::default(),
            handler: Arc::new(move |call| handler(call).boxed()),
        }
    }

    pub fn query<F, Fut>(handler: F) -> Self
    where
        F: Fn(Call<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self::new(Kind::Query, handler)
    }

    pub fn mutation<F, Fut>(handler: F) -> Self
    where
        F: Fn(Call<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self::new(Kind::Mutation, handler)
    }

    pub fn subscription<F, Fut>(handler: F) -> Self
    where
        F: Fn(Call<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcedureResult> + Send + 'static,
    {
        Self::new(Kind::Subscription, handler)
    }
}

impl<C> Procedure<C> {
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.meta.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.meta.path = Some(path.into());
        self
    }

    pub fn with_meta(mut self, meta: RestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn meta(&self) -> &RestMeta {
        &self.meta
    }

    pub(crate) fn invoke(&self, call: Call<C>) -> BoxFuture<'static, ProcedureResult> {
        (self.handler)(call)
    }
}

impl<C> Clone for Procedure<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            meta: self.meta.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> fmt::Debug for Procedure<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("kind", &self.kind)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// A node of the procedure tree.
#[derive(Debug)]
pub enum ProcedureNode<C> {
    Group(ProcedureTree<C>),
    Leaf(Procedure<C>),
}

impl<C> From<Procedure<C>> for ProcedureNode<C> {
    fn from(procedure: Procedure<C>) -> Self {
        ProcedureNode::Leaf(procedure)
    }
}

impl<C> From<ProcedureTree<C>> for ProcedureNode<C> {
    fn from(tree: ProcedureTree<C>) -> Self {
        ProcedureNode::Group(tree)
    }
}

/// A named group of procedures and sub-groups.
#[derive(Debug)]
pub struct ProcedureTree<C> {
    children: BTreeMap<String, ProcedureNode<C>>,
}

impl<C> ProcedureTree<C> {
    pub fn new() -> Self {
        Self {
            children: BTreeMap::new(),
        }
    }

    /// Add a leaf procedure under `name`.
    pub fn procedure(mut self, name: impl Into<String>, procedure: Procedure<C>) -> Self {
        self.children.insert(name.into(), ProcedureNode::Leaf(procedure));
        self
    }

    /// Nest a sub-group under `name`; its paths are prefixed with `name`.
    pub fn nest(mut self, name: impl Into<String>, group: ProcedureTree<C>) -> Self {
        self.children.insert(name.into(), ProcedureNode::Group(group));
        self
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ProcedureNode<C>)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<C> Default for ProcedureTree<C> {
    fn default() -> Self {
        Self::new()
    }
}
