//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the product routes
//! - Wire up middleware (request ID, tracing, timeout, body limit, shutdown cut-off)
//! - Run as the request-serving listener subsystem
//!
//! # Design Decisions
//! - The router is buildable without a socket so it can be driven in tests
//! - In-flight requests share one cancellation token that is tripped only if
//!   draining overruns the shutdown budget; the cut-off layer then answers
//!   them with 503 instead of letting them run on

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::middleware::cut_off_on_shutdown;
use crate::lifecycle::subsystem::{Subsystem, SubsystemError, SubsystemKind};
use crate::net::{bind, ServerTask};
use crate::products::ProductService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ProductService,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
}

/// The product REST listener.
pub struct HttpServer {
    bind_address: String,
    max_body_bytes: usize,
    state: AppState,
    task: Option<ServerTask>,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, service: ProductService) -> Self {
        Self {
            bind_address: config.listener.bind_address.clone(),
            max_body_bytes: config.listener.max_body_bytes,
            state: AppState {
                service,
                request_timeout: config.timeouts.request(),
                cancel: CancellationToken::new(),
            },
            task: None,
        }
    }

    /// The fully layered router, without binding a socket.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.max_body_bytes)
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.task.as_ref().map(ServerTask::local_addr)
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let request_timeout = state.request_timeout;
    Router::new()
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/{id}",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .layer(middleware::from_fn_with_state(state.clone(), cut_off_on_shutdown))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

#[async_trait]
impl Subsystem for HttpServer {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Listener
    }

    async fn start(&mut self) -> Result<(), SubsystemError> {
        let listener = bind(&self.bind_address).await?;
        let task = ServerTask::spawn(listener, self.router(), self.state.cancel.clone())?;
        tracing::info!(address = %task.local_addr(), "HTTP server accepting requests");
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        tracing::info!(?timeout, "HTTP server draining");
        let result = task.shutdown(timeout).await;
        if result.is_ok() {
            tracing::info!("HTTP server stopped");
        }
        result
    }
}
