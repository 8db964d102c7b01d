//! Request-scoped tracing.
//!
//! # Data Flow
//! ```text
//! inbound headers → propagation.rs (traceparent) → RequestContext
//!     → instrument.rs (child span per operation, current for the body)
//!     → span.rs (SpanGuard::drop finalizes)
//!     → client.rs (bounded queue → exporter)
//! ```
//!
//! # Design Decisions
//! - The carrier is explicit; nothing reads a global "current span"
//! - Spans are finalized by `Drop`, so no exit path can leak one
//! - Export is fire-and-forget from the request's point of view

pub mod client;
pub mod context;
pub mod instrument;
pub mod memory;
pub mod propagation;
pub mod span;

pub use client::{ExportError, LogExporter, SpanExporter, SpanQueue, TracingClient};
pub use context::{Cancelled, RequestContext, SpanContext, SpanId, TraceId};
pub use instrument::Instrumented;
pub use memory::MemorySink;
pub use propagation::{extract, format_traceparent, parse_traceparent, TRACEPARENT};
pub use span::{FinishedSpan, LogEntry, SpanGuard, SpanSink, TagValue, Tracer};
