//! Shutdown cut-off middleware.
//! Answers in-flight requests with 503 once the listener gives up draining.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::request::request_id;
use crate::http::response::ErrorBody;
use crate::http::server::AppState;

/// Message sent to requests cut off by shutdown.
pub const SHUTTING_DOWN: &str = "server shutting down";

/// Race the handler against the server's cancellation token.
///
/// The handler is polled first, so work that completes without suspending
/// is never cut off. When the token fires the handler future is dropped,
/// which finalizes its spans and records its metrics.
pub async fn cut_off_on_shutdown(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let id = request_id(req.headers()).to_string();
    tokio::select! {
        biased;
        response = next.run(req) => response,
        _ = state.cancel.cancelled() => {
            tracing::warn!(request_id = %id, "Request cut off by shutdown");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: SHUTTING_DOWN.to_string(),
                }),
            )
                .into_response()
        }
    }
}
