//! Network layer.
//!
//! # Data Flow
//! ```text
//! start():  bind address → TcpListener → ServerTask (axum::serve on a task)
//! stop():   stop accepting → drain in-flight → cancel → abort
//! ```
//!
//! Shared by the REST listener and the monitoring endpoint.

pub mod listener;

pub use listener::{bind, ServerTask};
