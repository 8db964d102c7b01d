//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use product_service::config::ServiceConfig;
use product_service::http::{build_router, AppState};
use product_service::observability::MetricsRecorder;
use product_service::products::{Product, ProductService};
use product_service::store::{Command, DataStore, Execution, MemoryStore, ProductRepository, Query, StoreError};
use product_service::trace::{MemorySink, RequestContext, Tracer};

/// Store whose every call fails, counting the attempts.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for FailingStore {
    async fn query(&self, _: Query, _: &RequestContext) -> Result<Vec<Product>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn execute(&self, _: Command, _: &RequestContext) -> Result<Execution, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Store that fails writes and delegates reads to an inner store.
#[derive(Debug, Default)]
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl DataStore for ReadOnlyStore {
    async fn query(&self, query: Query, cx: &RequestContext) -> Result<Vec<Product>, StoreError> {
        self.inner.query(query, cx).await
    }

    async fn execute(&self, _: Command, _: &RequestContext) -> Result<Execution, StoreError> {
        Err(StoreError::Query("insert rejected".into()))
    }
}

/// Store that takes `delay` to answer every call.
#[derive(Debug)]
pub struct SlowStore {
    pub delay: Duration,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataStore for SlowStore {
    async fn query(&self, _: Query, _: &RequestContext) -> Result<Vec<Product>, StoreError> {
        self.wait().await;
        Ok(Vec::new())
    }

    async fn execute(&self, _: Command, _: &RequestContext) -> Result<Execution, StoreError> {
        self.wait().await;
        Ok(Execution::default())
    }
}

/// Product service wired to an in-memory span sink and a private recorder.
pub struct Harness {
    pub service: ProductService,
    pub sink: Arc<MemorySink>,
    pub metrics: Arc<MetricsRecorder>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());
        let metrics = Arc::new(MetricsRecorder::new());
        let repo = ProductRepository::new(store, tracer.clone());
        Self {
            service: ProductService::new(repo, tracer, metrics.clone(), "product-service"),
            sink,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            request_timeout: Duration::from_secs(5),
            cancel: self.cancel.clone(),
        };
        build_router(state, 64 * 1024)
    }
}

/// Config bound to ephemeral loopback ports with short shutdown timings.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_address = "127.0.0.1:0".into();
    config.lifecycle.shutdown_timeout_secs = 1;
    config.lifecycle.grace_period_secs = 0;
    config
}

/// A loopback address that was free a moment ago.
pub fn free_address() -> String {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().to_string()
}

/// Drive one request through `router` and decode the JSON body.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, json)
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}
