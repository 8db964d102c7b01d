//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All components produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (per-operation counters and latencies)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → monitoring.rs (Prometheus scrape at GET /metrics)
//! ```
//!
//! Request spans live in `crate::trace`; this module does not depend on them.
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - No global metrics recorder; startup owns it and hands it out

pub mod logging;
pub mod metrics;
pub mod monitoring;

pub use logging::{init_logging, LoggingError};
pub use metrics::{DurationSummary, MetricsRecorder, OperationTimer, REQUESTS_TOTAL, REQUEST_DURATION_MS};
pub use monitoring::MonitoringServer;
