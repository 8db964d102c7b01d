//! Spans and the tracer that creates them.
//!
//! # Responsibilities
//! - Start spans as children of the carrier's current span
//! - Collect tags and timestamped log entries while the span is open
//! - Finalize every span exactly once and hand it to a [`SpanSink`]
//!
//! # Design Decisions
//! - A span is a guard: dropping it is the only way to finalize it, so every
//!   exit path (early return, `?`, dropped future, panic) closes the span
//! - Sinks never report errors back; a span that cannot be delivered is lost,
//!   the request is not

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::trace::context::SpanContext;

/// Scalar value of a tag or log field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => write!(f, "{}", v),
            TagValue::Int(v) => write!(f, "{}", v),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        TagValue::Int(v.into())
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for TagValue {
    fn from(v: usize) -> Self {
        TagValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

/// One structured log record attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Microseconds since the Unix epoch.
    pub timestamp_us: u64,
    pub fields: Vec<(String, TagValue)>,
}

/// A span after finalization, as delivered to the tracing backend.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub operation: &'static str,
    pub context: SpanContext,
    pub start_time: SystemTime,
    pub duration: Duration,
    pub tags: HashMap<String, TagValue>,
    pub logs: Vec<LogEntry>,
}

impl FinishedSpan {
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    /// Start time in microseconds since the Unix epoch.
    pub fn start_time_us(&self) -> u64 {
        unix_micros(self.start_time)
    }
}

/// Destination for finalized spans.
pub trait SpanSink: Send + Sync {
    /// Accept a finished span. Must not block and must not fail the caller.
    fn submit(&self, span: FinishedSpan);
}

/// Creates spans and routes them to a sink once finalized.
#[derive(Clone, Default)]
pub struct Tracer {
    sink: Option<Arc<dyn SpanSink>>,
}

impl Tracer {
    pub fn new(sink: Arc<dyn SpanSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A tracer whose spans are created and finalized but not exported.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Open a span named `operation` under `parent` (a root if `None`).
    pub fn start_span(&self, operation: &'static str, parent: Option<&SpanContext>) -> SpanGuard {
        SpanGuard {
            operation,
            context: SpanContext::child_of(parent),
            start_time: SystemTime::now(),
            started: Instant::now(),
            tags: HashMap::new(),
            logs: Vec::new(),
            sink: self.sink.clone(),
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

/// An open span. Finalized when dropped.
#[must_use = "a span is finalized as soon as it is dropped"]
pub struct SpanGuard {
    operation: &'static str,
    context: SpanContext,
    start_time: SystemTime,
    started: Instant,
    tags: HashMap<String, TagValue>,
    logs: Vec<LogEntry>,
    sink: Option<Arc<dyn SpanSink>>,
}

impl SpanGuard {
    pub fn context(&self) -> SpanContext {
        self.context
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Set a tag, replacing any earlier value for the key.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Append one timestamped log entry made of `fields`, in order.
    pub fn log_kv<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TagValue>,
    {
        let fields: Vec<(String, TagValue)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if fields.is_empty() {
            return;
        }
        self.logs.push(LogEntry {
            timestamp_us: unix_micros(SystemTime::now()),
            fields,
        });
    }

    /// Tag and log a failure message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.set_tag("error", message.clone());
        self.log_kv([("error", message)]);
    }

    /// Finalize now instead of at the end of the enclosing scope.
    pub fn finish(self) {}
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let Some(sink) = self.sink.take() else {
            return;
        };
        sink.submit(FinishedSpan {
            operation: self.operation,
            context: self.context,
            start_time: self.start_time,
            duration: self.started.elapsed(),
            tags: std::mem::take(&mut self.tags),
            logs: std::mem::take(&mut self.logs),
        });
    }
}

fn unix_micros(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
