//! W3C Trace Context (`traceparent`) extraction and injection.
//!
//! Parsing and rendering go through the OpenTelemetry `TraceContextPropagator`;
//! this module only converts between its span context and ours. Malformed
//! headers are ignored and the request starts a fresh trace.

use std::collections::HashMap;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{self as otel, TraceContextExt};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

use crate::trace::context::{SpanContext, SpanId, TraceId};

/// Header carrying the caller's span.
pub const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// Read-only view of request headers for the propagator.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        [TRACEPARENT, TRACESTATE]
            .into_iter()
            .filter(|k| self.0.contains_key(*k))
            .collect()
    }
}

/// Read the caller's span context from request headers, if any.
pub fn extract(headers: &HeaderMap) -> Option<SpanContext> {
    if !headers.contains_key(TRACEPARENT) {
        return None;
    }
    let parsed = from_otel(&TraceContextPropagator::new().extract(&HeaderExtractor(headers)));
    if parsed.is_none() {
        tracing::debug!(traceparent = ?headers.get(TRACEPARENT), "Ignoring malformed traceparent header");
    }
    parsed
}

/// Parse a single `traceparent` value.
pub fn parse_traceparent(value: &str) -> Option<SpanContext> {
    let carrier = HashMap::from([(TRACEPARENT.to_string(), value.to_string())]);
    from_otel(&TraceContextPropagator::new().extract(&carrier))
}

/// Render a span context as a sampled `traceparent` value.
pub fn format_traceparent(cx: &SpanContext) -> String {
    let remote = otel::SpanContext::new(
        otel::TraceId::from_bytes(cx.trace_id.as_u128().to_be_bytes()),
        otel::SpanId::from_bytes(cx.span_id.as_u64().to_be_bytes()),
        otel::TraceFlags::SAMPLED,
        true,
        otel::TraceState::default(),
    );
    let mut carrier: HashMap<String, String> = HashMap::new();
    TraceContextPropagator::new()
        .inject_context(&Context::new().with_remote_span_context(remote), &mut carrier);
    carrier.remove(TRACEPARENT).unwrap_or_default()
}

fn from_otel(cx: &Context) -> Option<SpanContext> {
    let span = cx.span();
    let remote = span.span_context();
    if !remote.is_valid() {
        return None;
    }
    let trace_id = TraceId::from_u128(u128::from_be_bytes(remote.trace_id().to_bytes()))?;
    let span_id = SpanId::from_u64(u64::from_be_bytes(remote.span_id().to_bytes()))?;
    Some(SpanContext::remote(trace_id, span_id))
}
