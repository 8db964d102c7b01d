//! Product REST service library.
//!
//! A product CRUD service with request-scoped span propagation, per-operation
//! metrics and a coordinator that owns the process lifecycle.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod products;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod trace;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{build_coordinator, Coordinator, Shutdown, StartupError};
