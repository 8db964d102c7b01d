//! Tracing client: the pipeline from finalized spans to the tracing backend.
//!
//! # Data Flow
//! ```text
//! SpanGuard::drop → SpanQueue (bounded, non-blocking) → worker task → SpanExporter
//! ```
//!
//! # Design Decisions
//! - Request tasks never wait on the backend; a full or closed queue drops
//!   the span and logs it
//! - Export errors are logged and swallowed
//! - `stop` closes the queue, drains what is buffered, then flushes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::lifecycle::subsystem::{Subsystem, SubsystemError, SubsystemKind};
use crate::trace::span::{FinishedSpan, SpanSink, Tracer};

/// Target used for exported span records.
pub const SPAN_LOG_TARGET: &str = "product_service::spans";

/// Errors raised by a span exporter.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode span: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Writes finished spans to a tracing backend.
pub trait SpanExporter: Send + 'static {
    fn export(&mut self, span: &FinishedSpan) -> Result<(), ExportError>;

    fn flush(&mut self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Exports spans as structured log records.
#[derive(Debug, Clone)]
pub struct LogExporter {
    service_name: String,
}

impl LogExporter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl SpanExporter for LogExporter {
    fn export(&mut self, span: &FinishedSpan) -> Result<(), ExportError> {
        let tags = serde_json::to_string(&span.tags)?;
        let logs = serde_json::to_string(&span.logs)?;
        let parent_id = span
            .context
            .parent_span_id
            .map(|id| id.to_string())
            .unwrap_or_default();

        tracing::info!(
            target: SPAN_LOG_TARGET,
            service = %self.service_name,
            operation = span.operation,
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            parent_id = %parent_id,
            start_us = span.start_time_us(),
            duration_us = u64::try_from(span.duration.as_micros()).unwrap_or(u64::MAX),
            tags = %tags,
            logs = %logs,
            "span finished"
        );
        Ok(())
    }
}

/// Non-blocking handle that feeds the tracing client's queue.
#[derive(Debug, Clone)]
pub struct SpanQueue {
    tx: mpsc::Sender<FinishedSpan>,
}

impl SpanSink for SpanQueue {
    fn submit(&self, span: FinishedSpan) {
        match self.tx.try_send(span) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(span)) => {
                tracing::warn!(operation = span.operation, "Span queue full, dropping span");
            }
            Err(mpsc::error::TrySendError::Closed(span)) => {
                tracing::debug!(operation = span.operation, "Tracing client stopped, dropping span");
            }
        }
    }
}

struct Worker {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Subsystem owning the span export pipeline.
pub struct TracingClient {
    queue: SpanQueue,
    pending: Option<(mpsc::Receiver<FinishedSpan>, Box<dyn SpanExporter>)>,
    worker: Option<Worker>,
}

impl TracingClient {
    pub fn new(exporter: impl SpanExporter, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            queue: SpanQueue { tx },
            pending: Some((rx, Box::new(exporter))),
            worker: None,
        }
    }

    /// A tracer that reports into this client.
    ///
    /// Spans finished before `start` are buffered up to the queue capacity.
    pub fn tracer(&self) -> Tracer {
        Tracer::new(Arc::new(self.queue.clone()))
    }
}

#[async_trait]
impl Subsystem for TracingClient {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::TracingClient
    }

    async fn start(&mut self) -> Result<(), SubsystemError> {
        let Some((rx, exporter)) = self.pending.take() else {
            return Err(SubsystemError::Task("tracing client already started".into()));
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_worker(rx, exporter, stop_rx));
        self.worker = Some(Worker { stop_tx, join });
        tracing::info!("Tracing client started");
        Ok(())
    }

    async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError> {
        let Some(Worker { stop_tx, mut join }) = self.worker.take() else {
            return Ok(());
        };
        let _ = stop_tx.send(());

        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => {
                tracing::info!("Tracing client flushed and closed");
                Ok(())
            }
            Ok(Err(e)) => Err(SubsystemError::Task(format!("span exporter task failed: {}", e))),
            Err(_) => {
                join.abort();
                Err(SubsystemError::Timeout(timeout))
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<FinishedSpan>,
    mut exporter: Box<dyn SpanExporter>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            span = rx.recv() => match span {
                Some(span) => export_one(exporter.as_mut(), &span),
                None => break,
            },
        }
    }

    // Refuse new spans, then drain what was already queued.
    rx.close();
    let mut drained = 0usize;
    while let Some(span) = rx.recv().await {
        export_one(exporter.as_mut(), &span);
        drained += 1;
    }
    if let Err(e) = exporter.flush() {
        tracing::warn!(error = %e, "Span exporter flush failed");
    }
    tracing::debug!(drained, "Span worker exited");
}

fn export_one(exporter: &mut dyn SpanExporter, span: &FinishedSpan) {
    if let Err(e) = exporter.export(span) {
        tracing::warn!(operation = span.operation, error = %e, "Span export failed");
    }
}
