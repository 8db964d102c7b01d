//! Data store capability.
//!
//! # Data Flow
//! ```text
//! ProductService
//!     → repository.rs (one "-db" span per call, cancellation check)
//!     → DataStore::query / DataStore::execute
//!     → memory.rs (default backend) or any injected implementation
//! ```
//!
//! # Design Decisions
//! - The store is a trait object so tests inject failing backends
//! - Queries and commands are closed enums; each names its own statement,
//!   which is what the store span reports
//! - Backends do not trace; the repository does it for them

pub mod memory;
pub mod repository;

use async_trait::async_trait;

use crate::products::model::{NewProduct, Product};
use crate::trace::context::{Cancelled, RequestContext};

pub use memory::MemoryStore;
pub use repository::ProductRepository;

/// Read operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    ListProducts { start: u64, count: u64 },
    GetProduct { id: u64 },
}

impl Query {
    pub fn statement(&self) -> &'static str {
        match self {
            Query::ListProducts { .. } => "SELECT id, name, price FROM products ORDER BY id LIMIT $1 OFFSET $2",
            Query::GetProduct { .. } => "SELECT name, price FROM products WHERE id=$1",
        }
    }
}

/// Write operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InsertProduct(NewProduct),
    UpdateProduct(Product),
    DeleteProduct { id: u64 },
    DeleteAllProducts,
}

impl Command {
    pub fn statement(&self) -> &'static str {
        match self {
            Command::InsertProduct(_) => "INSERT INTO products(name, price) VALUES($1, $2) RETURNING id",
            Command::UpdateProduct(_) => "UPDATE products SET name=$1, price=$2 WHERE id=$3",
            Command::DeleteProduct { .. } => "DELETE FROM products WHERE id=$1",
            Command::DeleteAllProducts => "DELETE FROM products",
        }
    }
}

/// Result of a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub rows_affected: u64,
    /// The row written, for commands that return one.
    pub returned: Option<Product>,
}

/// Failure of a store call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Backend holding the products.
///
/// Implementations may observe `cx` for deadlines and cancellation. They do
/// not create spans.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn query(&self, query: Query, cx: &RequestContext) -> Result<Vec<Product>, StoreError>;

    async fn execute(&self, command: Command, cx: &RequestContext) -> Result<Execution, StoreError>;
}
