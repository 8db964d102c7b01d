//! Instrumented operations.
//!
//! Wraps a unit of work in a span that is a child of the carrier's current
//! span, makes the new span current for the work, lets the caller tag the
//! outcome, and finalizes the span on every exit path.

use std::future::Future;

use tracing::Instrument as _;

use crate::trace::context::RequestContext;
use crate::trace::span::{SpanGuard, TagValue, Tracer};

/// Builder for one instrumented call.
///
/// ```ignore
/// Instrumented::new(&tracer, "get-product-db")
///     .tag("product-id", id)
///     .run(&cx, |cx| store.get(id, cx), |span, result| { /* outcome tags */ })
///     .await
/// ```
#[must_use = "an instrumented operation does nothing until `run` is awaited"]
pub struct Instrumented<'t> {
    tracer: &'t Tracer,
    operation: &'static str,
    tags: Vec<(String, TagValue)>,
    fields: Vec<(String, TagValue)>,
}

impl<'t> Instrumented<'t> {
    pub fn new(tracer: &'t Tracer, operation: &'static str) -> Self {
        Self {
            tracer,
            operation,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Tag applied to the span before the body runs.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Field of the log entry written when the span opens.
    pub fn log(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Run `body` under a new span and return its result unchanged.
    ///
    /// `outcome` sees the result before the span is finalized and may add
    /// tags or log entries for it. The span is finalized when this future
    /// completes or is dropped, whichever comes first.
    pub async fn run<T, E, F, Fut, O>(self, cx: &RequestContext, body: F, outcome: O) -> Result<T, E>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        O: FnOnce(&mut SpanGuard, &Result<T, E>),
    {
        let parent = cx.current_span();
        let mut span = self.tracer.start_span(self.operation, parent.as_ref());
        for (key, value) in self.tags {
            span.set_tag(key, value);
        }
        span.log_kv(self.fields);

        let active = span.context();
        let log_span = tracing::debug_span!(
            "operation",
            operation = self.operation,
            trace_id = %active.trace_id,
            span_id = %active.span_id,
        );

        let result = body(cx.with_span(active)).instrument(log_span).await;
        outcome(&mut span, &result);
        result
    }
}
