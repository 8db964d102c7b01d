//! Inbound request context.
//!
//! # Responsibilities
//! - Adopt the caller's trace from a `traceparent` header
//! - Attach the request deadline and the server's cancellation token
//! - Expose the request ID set by the middleware stack
//!
//! # Design Decisions
//! - A missing or malformed `traceparent` is not an error; the request just
//!   starts a new trace
//! - Each request gets a child token so cancelling one never cancels the server

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::http::server::AppState;
use crate::trace::context::RequestContext;
use crate::trace::propagation;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Build the carrier for one inbound request.
pub fn request_context(headers: &HeaderMap, timeout: Duration, cancel: &CancellationToken) -> RequestContext {
    let base = RequestContext::background()
        .with_deadline(Instant::now() + timeout)
        .with_cancellation(cancel.child_token());

    match propagation::extract(headers) {
        Some(remote) => base.with_span(remote),
        None => base,
    }
}

/// Request ID assigned by the middleware, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Extractor yielding the request's [`RequestContext`].
#[derive(Debug, Clone)]
pub struct Traced(pub RequestContext);

impl FromRequestParts<AppState> for Traced {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cx = request_context(&parts.headers, state.request_timeout, &state.cancel);
        tracing::debug!(
            request_id = %request_id(&parts.headers),
            method = %parts.method,
            path = %parts.uri.path(),
            remote_parent = cx.current_span().is_some(),
            "Request context built"
        );
        Ok(Traced(cx))
    }
}
