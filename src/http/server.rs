//! HTTP server setup.
//!
//! # Responsibilities
//! - Mount a `RestHandler` on an Axum router
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind to a listener and serve until shutdown

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::handler::RestHandler;

impl<C: Send + Sync + 'static> RestHandler<C> {
    /// An Axum router sending every request to this handler.
    pub fn into_router(self) -> Router {
        Router::new().fallback(move |request: Request<Body>| {
            let handler = self.clone();
            async move { handler.handle(request).await }
        })
    }
}

/// HTTP server for a procedure tree.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server for `handler` using the listener-independent parts of `config`.
    pub fn new<C: Send + Sync + 'static>(handler: RestHandler<C>, config: GatewayConfig) -> Self {
        let router = Self::build_router(&config, handler.into_router());
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, router: Router) -> Router {
        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires or its sender is dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
