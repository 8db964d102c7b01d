//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::ServerTask)
//!     → server.rs (Axum router, middleware: request ID, trace, timeout, body limit)
//!     → middleware.rs (503 for requests still running when draining gives up)
//!     → request.rs (traceparent, deadline, cancellation → RequestContext)
//!     → handlers.rs (ProductService call)
//!     → response.rs (status mapping, JSON bodies)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_context, request_id, Traced, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
