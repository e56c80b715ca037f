//! Demo gateway exposing a small procedure tree over REST.
//!
//! ```text
//! GET    /echo/:message     → the message, as text
//! POST   /hello             → 201 {"hello": <content>}
//! GET    /add?a=1&b=2       → {"result": 3}
//! GET    /redirect/:target  → 302 to /<target>
//! GET    /users/:id         → the user, or 404
//! POST   /users             → 201 with the created user (requires a bearer token)
//! DELETE /users/:id         → 204
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use rpc_rest_gateway::config::{load_config, GatewayConfig, ValidationError};
use rpc_rest_gateway::observability::{logging, metrics};
use rpc_rest_gateway::{
    status, Call, GatewayServer, HandlerOptions, HttpMethod, Output, Procedure, ProcedureResult,
    ProcedureTree, RestHandler, RpcError, Shutdown,
};

#[derive(Parser)]
#[command(name = "rpc-rest-gateway")]
#[command(about = "Serve a demo procedure tree over REST", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

/// Per-request context: the bearer token, if any.
#[derive(Debug, Default)]
struct DemoContext {
    token: Option<String>,
}

fn context_from(head: &Parts) -> Result<DemoContext, RpcError> {
    let token = match head.headers.get(AUTHORIZATION) {
        None => None,
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| RpcError::unauthorized("Malformed authorization header"))?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or_else(|| RpcError::unauthorized("Expected a bearer token"))?;
            Some(token.to_string())
        }
    };
    Ok(DemoContext { token })
}

#[derive(Deserialize)]
struct EchoInput {
    message: String,
}

#[derive(Deserialize)]
struct HelloInput {
    content: String,
}

#[derive(Deserialize)]
struct AddInput {
    a: String,
    b: String,
}

#[derive(Deserialize)]
struct UserInput {
    id: String,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

fn parse_number(field: &str, raw: &str) -> Result<f64, RpcError> {
    raw.trim()
        .parse()
        .map_err(|_| RpcError::bad_request(format!("'{field}' is not a number")))
}

async fn echo(call: Call<DemoContext>) -> ProcedureResult {
    let input: EchoInput = call.parse_input()?;
    Ok(Output::from(input.message))
}

async fn hello(call: Call<DemoContext>) -> ProcedureResult {
    let input: HelloInput = call.parse_input()?;
    Ok(status(201).json(&json!({ "hello": input.content }))?.into())
}

async fn add(call: Call<DemoContext>) -> ProcedureResult {
    let input: AddInput = call.parse_input()?;
    let sum = parse_number("a", &input.a)? + parse_number("b", &input.b)?;
    let result = if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
        json!(sum as i64)
    } else {
        json!(sum)
    };
    Ok(json!({ "result": result }).into())
}

async fn redirect(call: Call<DemoContext>) -> ProcedureResult {
    let target = call
        .input
        .get("target")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(status(200).redirect_to(format!("/{target}"), 302).into())
}

async fn get_user(call: Call<DemoContext>) -> ProcedureResult {
    let input: UserInput = call.parse_input()?;
    match input.id.as_str() {
        "1" => Ok(json!({ "id": "1", "name": "neko" }).into()),
        other => Err(RpcError::not_found(format!("User {other} not found"))),
    }
}

async fn create_user(call: Call<DemoContext>) -> ProcedureResult {
    if call.ctx.token.is_none() {
        return Err(RpcError::unauthorized("Sign in to create users"));
    }
    let input: NewUser = call.parse_input()?;
    Ok(status(201)
        .header("Location", "/users/2")
        .json(&json!({ "id": "2", "name": input.name }))?
        .into())
}

async fn delete_user(_call: Call<DemoContext>) -> ProcedureResult {
    Ok(status(204).into())
}

fn demo_tree() -> ProcedureTree<DemoContext> {
    let users = ProcedureTree::new()
        .procedure("get", Procedure::query(get_user).path("/users/:id"))
        .procedure("create", Procedure::mutation(create_user).path("/users"))
        .procedure(
            "delete",
            Procedure::mutation(delete_user)
                .method(HttpMethod::Delete)
                .path("/users/:id"),
        );

    ProcedureTree::new()
        .procedure("echo", Procedure::query(echo).path("/echo/:message"))
        .procedure("hello", Procedure::mutation(hello))
        .procedure("add", Procedure::query(add))
        .procedure("redirect", Procedure::query(redirect).path("/redirect/:target"))
        .nest("users", users)
}

fn report(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }
    rpc_rest_gateway::config::validate_config(&config)
        .map_err(|errors| format!("invalid configuration: {}", report(&errors)))?;

    logging::init_logging(&config.observability)?;
    tracing::info!("rpc-rest-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_size = config.handler.max_body_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics endpoint");
        }
    }

    let handler = RestHandler::builder(demo_tree())
        .context(|head: &Parts| std::future::ready(context_from(head)))
        .on_error(|event| {
            tracing::info!(
                procedure = event.procedure,
                path = event.path,
                status = event.error.status(),
                authenticated = event.ctx.is_some_and(|ctx| ctx.token.is_some()),
                "Procedure error observed"
            );
        })
        .options(HandlerOptions::from(&config.handler))
        .build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(handler, config);
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal.trigger_on_ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
