//! Monitoring endpoint subsystem.
//!
//! Serves the Prometheus text exposition of the [`MetricsRecorder`] at
//! `GET /metrics` on its own listener, separate from product traffic.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::subsystem::{Subsystem, SubsystemError, SubsystemKind};
use crate::net::{bind, ServerTask};
use crate::observability::metrics::MetricsRecorder;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Scrape endpoint for request metrics.
pub struct MonitoringServer {
    address: String,
    recorder: Arc<MetricsRecorder>,
    task: Option<ServerTask>,
}

impl MonitoringServer {
    pub fn new(address: impl Into<String>, recorder: Arc<MetricsRecorder>) -> Self {
        Self {
            address: address.into(),
            recorder,
            task: None,
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.task.as_ref().map(ServerTask::local_addr)
    }

    pub fn router(recorder: Arc<MetricsRecorder>) -> Router {
        Router::new()
            .route("/metrics", get(render_metrics))
            .with_state(recorder)
    }
}

async fn render_metrics(State(recorder): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], recorder.render())
}

#[async_trait]
impl Subsystem for MonitoringServer {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Monitoring
    }

    async fn start(&mut self) -> Result<(), SubsystemError> {
        let listener = bind(&self.address).await?;
        let task = ServerTask::spawn(
            listener,
            Self::router(self.recorder.clone()),
            CancellationToken::new(),
        )?;
        tracing::info!(address = %task.local_addr(), "Metrics endpoint serving /metrics");
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError> {
        match self.task.take() {
            Some(task) => task.shutdown(timeout).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_route_renders_recorder() {
        let recorder = Arc::new(MetricsRecorder::new());
        recorder.record_invocation("getProduct");

        let response = MonitoringServer::router(recorder)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"product_rest_requests_total{operation="getProduct"} 1"#));
    }

    #[tokio::test]
    async fn start_on_busy_port_fails() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let mut server = MonitoringServer::new(address, Arc::new(MetricsRecorder::new()));
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, SubsystemError::Bind { .. }));
        assert!(server.stop(Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn start_then_stop_releases_port() {
        let mut server = MonitoringServer::new("127.0.0.1:0", Arc::new(MetricsRecorder::new()));
        server.start().await.unwrap();
        assert!(server.local_addr().is_some());

        server.stop(Duration::from_secs(1)).await.unwrap();
        assert!(server.local_addr().is_none());
    }
}
