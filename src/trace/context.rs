//! Span identity and the request-scoped carrier.
//!
//! # Responsibilities
//! - Generate trace and span identifiers
//! - Link child spans to their parent
//! - Carry the current span, deadline and cancellation down the call graph
//!
//! # Design Decisions
//! - `RequestContext` is a value: `with_*` methods return a new carrier and
//!   never touch the one they were called on
//! - No thread-local or global "current span"; the carrier is passed explicitly

use std::fmt;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

/// 128-bit identifier shared by every span of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generate a new random, non-zero trace ID.
    pub fn random() -> Self {
        Self(fastrand::u128(1..))
    }

    /// Build from a raw value. Zero is not a valid trace ID.
    pub fn from_u128(value: u128) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// 64-bit identifier of a single span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a new random, non-zero span ID.
    pub fn random() -> Self {
        Self(fastrand::u64(1..))
    }

    /// Build from a raw value. Zero is not a valid span ID.
    pub fn from_u64(value: u64) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Causal token linking a span to its trace and parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    /// `None` for root spans and for contexts adopted from a remote caller.
    pub parent_span_id: Option<SpanId>,
}

impl SpanContext {
    /// Start a new trace.
    pub fn root() -> Self {
        Self {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            parent_span_id: None,
        }
    }

    /// A context received from another process (e.g. a `traceparent` header).
    pub fn remote(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
        }
    }

    /// A new span in the same trace whose parent is `self`.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id),
        }
    }

    /// Child of `parent` if there is one, otherwise a new root.
    pub fn child_of(parent: Option<&SpanContext>) -> Self {
        match parent {
            Some(parent) => parent.child(),
            None => Self::root(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

/// Why a request stopped before delegated work was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error("request cancelled")]
    Cancelled,
}

/// The ambient carrier threaded through every instrumented call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    span: Option<SpanContext>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl RequestContext {
    /// An empty carrier: no span, no deadline, never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// The span that new operations should be parented to.
    pub fn current_span(&self) -> Option<SpanContext> {
        self.span
    }

    /// A copy of this carrier with `span` as the current span.
    pub fn with_span(&self, span: SpanContext) -> Self {
        Self {
            span: Some(span),
            ..self.clone()
        }
    }

    /// A copy of this carrier that expires at `deadline`.
    ///
    /// An earlier deadline already on the carrier wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// A copy of this carrier cancelled together with `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self.clone()
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the caller has gone away or the deadline has passed.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Cancelled::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Cancelled::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn root_has_no_parent() {
        let root = SpanContext::child_of(None);
        assert!(root.is_root());
        assert_eq!(root.parent_span_id, None);
    }

    #[test]
    fn child_links_to_parent() {
        let parent = SpanContext::root();
        let child = SpanContext::child_of(Some(&parent));

        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.parent_span_id, Some(parent.span_id));
        assert_ne!(child.span_id, parent.span_id);
    }

    #[test]
    fn with_span_leaves_original_untouched() {
        let base = RequestContext::background();
        let span = SpanContext::root();

        let derived = base.with_span(span);

        assert_eq!(base.current_span(), None);
        assert_eq!(derived.current_span(), Some(span));
    }

    #[test]
    fn expired_deadline_fails_check() {
        let cx = RequestContext::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(cx.check(), Err(Cancelled::DeadlineExceeded));
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);

        let cx = RequestContext::background().with_deadline(soon).with_deadline(later);
        assert_eq!(cx.deadline(), Some(soon));
    }

    #[test]
    fn cancelled_token_fails_check() {
        let token = CancellationToken::new();
        let cx = RequestContext::background().with_cancellation(token.clone());
        assert!(cx.check().is_ok());

        token.cancel();
        assert_eq!(cx.check(), Err(Cancelled::Cancelled));
    }

    #[test]
    fn zero_ids_are_rejected() {
        assert!(TraceId::from_u128(0).is_none());
        assert!(SpanId::from_u64(0).is_none());
        assert_eq!(SpanId::from_u64(0xab).map(|s| s.to_string()).as_deref(), Some("00000000000000ab"));
    }
}
