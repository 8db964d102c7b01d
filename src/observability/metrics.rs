//! Request metrics.
//!
//! # Responsibilities
//! - Count invocations of each top-level REST operation
//! - Record the duration of each invocation in milliseconds
//! - Render both in Prometheus text format for the monitoring endpoint
//!
//! # Metrics
//! - `product_rest_requests_total` (counter): invocations by operation
//! - `product_rest_request_duration_ms` (summary): latency by operation
//!
//! # Design Decisions
//! - The Prometheus recorder is owned, not installed globally; every update
//!   runs under `metrics::with_local_recorder`
//! - Per-operation stats are kept alongside for exact reads (atomic counter,
//!   lock-protected duration summary of fixed size); the distribution itself
//!   lives only in the Prometheus histogram
//! - Operation names are `&'static str`, so they can never come from request data

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// Counter of invocations, labelled by `operation`.
pub const REQUESTS_TOTAL: &str = "product_rest_requests_total";
/// Invocation latency in milliseconds, labelled by `operation`.
pub const REQUEST_DURATION_MS: &str = "product_rest_request_duration_ms";

/// Running aggregate of one operation's durations, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationSummary {
    pub count: u64,
    pub sum_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl DurationSummary {
    fn observe(&mut self, ms: f64) {
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.sum_ms += ms;
    }

    /// Mean duration, or `None` before the first observation.
    pub fn mean_ms(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_ms / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct OperationStats {
    invocations: AtomicU64,
    durations: Mutex<DurationSummary>,
}

/// Process-wide recorder shared by every request task.
pub struct MetricsRecorder {
    operations: DashMap<&'static str, Arc<OperationStats>>,
    exporter: PrometheusRecorder,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let exporter = PrometheusBuilder::new().build_recorder();
        metrics::with_local_recorder(&exporter, || {
            metrics::describe_counter!(REQUESTS_TOTAL, "Total REST operations handled");
            metrics::describe_histogram!(
                REQUEST_DURATION_MS,
                metrics::Unit::Milliseconds,
                "REST operation latency"
            );
        });
        Self {
            operations: DashMap::new(),
            exporter,
        }
    }

    fn stats(&self, operation: &'static str) -> Arc<OperationStats> {
        self.operations.entry(operation).or_default().clone()
    }

    /// Count one invocation of `operation`.
    pub fn record_invocation(&self, operation: &'static str) {
        self.stats(operation).invocations.fetch_add(1, Ordering::Relaxed);
        metrics::with_local_recorder(&self.exporter, || {
            metrics::counter!(REQUESTS_TOTAL, "operation" => operation).increment(1);
        });
    }

    /// Record how long one invocation of `operation` took.
    pub fn record_duration(&self, operation: &'static str, elapsed: Duration) {
        let ms = elapsed.as_nanos() as f64 / 1_000_000.0;
        self.stats(operation)
            .durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(ms);
        metrics::with_local_recorder(&self.exporter, || {
            metrics::histogram!(REQUEST_DURATION_MS, "operation" => operation).record(ms);
        });
    }

    /// Start timing one invocation of `operation`.
    ///
    /// The invocation and its duration are recorded when the timer is
    /// dropped, whether the operation finished or was abandoned.
    pub fn start_timer(&self, operation: &'static str) -> OperationTimer<'_> {
        OperationTimer {
            recorder: self,
            operation,
            started: Instant::now(),
        }
    }

    /// Invocations of `operation` recorded so far.
    pub fn invocations(&self, operation: &str) -> u64 {
        self.operations
            .get(operation)
            .map(|s| s.invocations.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Summary of the durations recorded for `operation`.
    pub fn durations(&self, operation: &str) -> DurationSummary {
        self.operations
            .get(operation)
            .map(|s| *s.durations.lock().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_default()
    }

    pub fn handle(&self) -> PrometheusHandle {
        self.exporter.handle()
    }

    /// Prometheus text exposition of everything recorded.
    pub fn render(&self) -> String {
        self.exporter.handle().render()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// Guard returned by [`MetricsRecorder::start_timer`].
#[must_use = "the invocation is recorded as soon as the timer is dropped"]
pub struct OperationTimer<'a> {
    recorder: &'a MetricsRecorder,
    operation: &'static str,
    started: Instant,
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        self.recorder.record_invocation(self.operation);
        self.recorder.record_duration(self.operation, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invocations_lose_no_update() {
        let recorder = Arc::new(MetricsRecorder::new());

        let tasks: Vec<_> = (0..1000)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder.record_invocation("getProducts");
                    recorder.record_duration("getProducts", Duration::from_micros(250));
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(recorder.invocations("getProducts"), 1000);
        let summary = recorder.durations("getProducts");
        assert_eq!(summary.count, 1000);
        assert_eq!(summary.min_ms, 0.25);
        assert_eq!(summary.max_ms, 0.25);
        assert!(recorder
            .render()
            .contains(r#"product_rest_requests_total{operation="getProducts"} 1000"#));
    }

    #[test]
    fn operations_are_tracked_separately() {
        let recorder = MetricsRecorder::new();
        recorder.record_invocation("createProduct");
        recorder.record_duration("createProduct", Duration::from_millis(12));

        assert_eq!(recorder.invocations("createProduct"), 1);
        assert_eq!(recorder.invocations("getProduct"), 0);
        recorder.record_duration("createProduct", Duration::from_millis(4));

        let summary = recorder.durations("createProduct");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.sum_ms, 16.0);
        assert_eq!(summary.min_ms, 4.0);
        assert_eq!(summary.max_ms, 12.0);
        assert_eq!(summary.mean_ms(), Some(8.0));
        assert_eq!(recorder.durations("getProduct"), DurationSummary::default());
        assert_eq!(recorder.durations("getProduct").mean_ms(), None);
    }

    #[tokio::test]
    async fn abandoned_operation_is_still_recorded_once() {
        let recorder = MetricsRecorder::new();
        let slow = async {
            let _timer = recorder.start_timer("getProducts");
            tokio::time::sleep(Duration::from_secs(30)).await;
        };
        assert!(tokio::time::timeout(Duration::from_millis(10), slow).await.is_err());

        assert_eq!(recorder.invocations("getProducts"), 1);
        assert_eq!(recorder.durations("getProducts").count, 1);
    }

    #[test]
    fn render_includes_duration_series() {
        let recorder = MetricsRecorder::new();
        recorder.record_duration("deleteProduct", Duration::from_millis(3));

        let text = recorder.render();
        assert!(text.contains(REQUEST_DURATION_MS));
        assert!(text.contains(r#"operation="deleteProduct""#));
    }

    #[test]
    fn recorders_do_not_share_state() {
        let a = MetricsRecorder::new();
        let b = MetricsRecorder::new();
        a.record_invocation("getProduct");

        assert_eq!(b.invocations("getProduct"), 0);
        assert!(!b.render().contains(r#"operation="getProduct""#));
    }
}
