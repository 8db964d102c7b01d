//! Product resource.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs (handler span, payload validation, metrics)
//!     → store::ProductRepository (store span)
//! ```

pub mod model;
pub mod service;

pub use model::{NewProduct, Operation, Paging, Product, MAX_PAGE_SIZE};
pub use service::{ProductService, ServiceError};
