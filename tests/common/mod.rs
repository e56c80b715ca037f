//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::{json, Value};

use rpc_rest_gateway::{
    status, Call, ErrorCode, HandlerOptions, HttpMethod, Output, Procedure, ProcedureResult,
    ProcedureTree, RestHandler, RestHandlerBuilder, RpcError,
};

/// Per-request context built from the `Authorization` header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TestContext {
    pub user: Option<String>,
}

/// Rejects a present but non-bearer `Authorization` header.
pub fn context_from(head: &Parts) -> Result<TestContext, RpcError> {
    match head.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        None => Ok(TestContext::default()),
        Some(value) => value
            .strip_prefix("Bearer ")
            .map(|user| TestContext {
                user: Some(user.to_string()),
            })
            .ok_or_else(|| RpcError::unauthorized("Invalid credentials")),
    }
}

#[derive(Deserialize)]
struct AddInput {
    a: String,
    b: String,
}

fn number(raw: &str) -> Result<i64, RpcError> {
    raw.parse()
        .map_err(|_| RpcError::bad_request(format!("'{raw}' is not a number")))
}

async fn echo(call: Call<TestContext>) -> ProcedureResult {
    let message = call
        .input
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(message.into())
}

async fn hello(call: Call<TestContext>) -> ProcedureResult {
    let content = call.input.get("content").cloned().unwrap_or(Value::Null);
    Ok(status(201).json(&json!({ "hello": content }))?.into())
}

async fn add(call: Call<TestContext>) -> ProcedureResult {
    let input: AddInput = call.parse_input()?;
    Ok(json!({ "result": number(&input.a)? + number(&input.b)? }).into())
}

async fn redirect(call: Call<TestContext>) -> ProcedureResult {
    let target = call
        .input
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(status(200)
        .redirect_to(format!("https://example.com/{target}"), 302)
        .into())
}

/// Returns the merged input untouched.
async fn inspect(call: Call<TestContext>) -> ProcedureResult {
    Ok(Output::Value(call.input))
}

async fn whoami(call: Call<TestContext>) -> ProcedureResult {
    match &call.ctx.user {
        Some(user) => Ok(json!({ "user": user, "procedure": call.procedure }).into()),
        None => Err(RpcError::unauthorized("Not signed in")),
    }
}

async fn boom(_call: Call<TestContext>) -> ProcedureResult {
    panic!("procedure exploded");
}

async fn teapot(_call: Call<TestContext>) -> ProcedureResult {
    Err(RpcError::new(ErrorCode::BadRequest, "short and stout").with_status(418))
}

/// The procedure tree used across the integration tests.
pub fn scenario_tree() -> ProcedureTree<TestContext> {
    let users = ProcedureTree::new()
        .procedure(
            "update",
            Procedure::mutation(inspect)
                .method(HttpMethod::Put)
                .path("/users/:id"),
        )
        .procedure(
            "remove",
            Procedure::mutation(inspect)
                .method(HttpMethod::Delete)
                .path("/users/:id"),
        );

    ProcedureTree::new()
        .procedure("echo", Procedure::query(echo).path("/echo/:message"))
        .procedure("hello", Procedure::mutation(hello))
        .procedure("add", Procedure::query(add))
        .procedure("redirect", Procedure::query(redirect).path("/redirect/:target"))
        .procedure("inspect", Procedure::mutation(inspect))
        .procedure("whoami", Procedure::query(whoami))
        .procedure("boom", Procedure::query(boom))
        .procedure("teapot", Procedure::query(teapot))
        .nest("users", users)
}

/// A builder over the scenario tree with the test context factory installed.
pub fn builder() -> RestHandlerBuilder<TestContext> {
    RestHandler::builder(scenario_tree())
        .context(|head: &Parts| std::future::ready(context_from(head)))
}

pub fn handler() -> RestHandler<TestContext> {
    builder().build().unwrap()
}

pub fn handler_with(options: HandlerOptions) -> RestHandler<TestContext> {
    builder().options(options).build().unwrap()
}

/// Every error event seen by the hook: (status, context user, input).
pub type Recorded = Arc<Mutex<Vec<(u16, Option<Option<String>>, Option<Value>)>>>;

pub fn recording_handler() -> (RestHandler<TestContext>, Recorded) {
    let recorded: Recorded = Arc::default();
    let sink = Arc::clone(&recorded);
    let handler = builder()
        .on_error(move |event| {
            sink.lock().unwrap().push((
                event.error.status(),
                event.ctx.map(|ctx| ctx.user.clone()),
                event.input.cloned(),
            ));
        })
        .build()
        .unwrap();
    (handler, recorded)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

pub fn with_body(method: &str, uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    with_body(method, uri, "application/json", body)
}

/// A fully read response.
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn read(response: Response<Body>) -> TestResponse {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    TestResponse {
        status: parts.status.as_u16(),
        headers: parts.headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn send(handler: &RestHandler<TestContext>, request: Request<Body>) -> TestResponse {
    read(handler.handle(request).await).await
}
