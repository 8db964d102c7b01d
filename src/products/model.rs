//! Product resource types and request parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stored product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID[{}] Name[{}] Price[{:.2}]", self.id, self.name, self.price)
    }
}

/// Client-supplied product fields. Any `id` in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
}

impl NewProduct {
    pub fn with_id(self, id: u64) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
        }
    }
}

impl fmt::Display for NewProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name[{}] Price[{:.2}]", self.name, self.price)
    }
}

/// Upper bound and default for `count`.
pub const MAX_PAGE_SIZE: u64 = 10;

/// Normalized `start`/`count` of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub start: u64,
    pub count: u64,
}

impl Paging {
    /// Normalize raw query values.
    ///
    /// Missing or unparsable values count as 0. `count` outside
    /// `1..=MAX_PAGE_SIZE` becomes `MAX_PAGE_SIZE`; negative `start` becomes 0.
    pub fn from_params(start: Option<&str>, count: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0);

        let count = match parse(count) {
            n @ 1..=10 => n as u64,
            _ => MAX_PAGE_SIZE,
        };
        let start = u64::try_from(parse(start)).unwrap_or(0);
        Self { start, count }
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            start: 0,
            count: MAX_PAGE_SIZE,
        }
    }
}

/// The REST operations. Metric labels and span names come only from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetProducts,
    GetProduct,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::GetProducts,
        Operation::GetProduct,
        Operation::CreateProduct,
        Operation::UpdateProduct,
        Operation::DeleteProduct,
    ];

    /// Label used for request metrics.
    pub fn metric_name(self) -> &'static str {
        match self {
            Operation::GetProducts => "getProducts",
            Operation::GetProduct => "getProduct",
            Operation::CreateProduct => "createProduct",
            Operation::UpdateProduct => "updateProduct",
            Operation::DeleteProduct => "deleteProduct",
        }
    }

    /// Name of the handler-level span.
    pub fn span_name(self) -> &'static str {
        match self {
            Operation::GetProducts => "get-products-handler",
            Operation::GetProduct => "get-product-handler",
            Operation::CreateProduct => "create-product-handler",
            Operation::UpdateProduct => "update-product-handler",
            Operation::DeleteProduct => "delete-product-handler",
        }
    }

    /// Outcome tag set on the handler span.
    pub fn outcome_tag(self) -> &'static str {
        match self {
            Operation::GetProducts => "products-found",
            Operation::GetProduct => "product-found",
            Operation::CreateProduct => "product-created",
            Operation::UpdateProduct => "product-updated",
            Operation::DeleteProduct => "product-deleted",
        }
    }

    /// Prefix of client-facing error messages.
    pub fn failure_prefix(self) -> &'static str {
        match self {
            Operation::GetProducts => "Get products failed",
            Operation::GetProduct => "Get product failed",
            Operation::CreateProduct => "Create product failed",
            Operation::UpdateProduct => "Update product failed",
            Operation::DeleteProduct => "Delete product failed",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_clamps_count() {
        assert_eq!(Paging::from_params(None, Some("5")).count, 5);
        assert_eq!(Paging::from_params(None, Some("0")).count, 10);
        assert_eq!(Paging::from_params(None, Some("11")).count, 10);
        assert_eq!(Paging::from_params(None, Some("-3")).count, 10);
        assert_eq!(Paging::from_params(None, None).count, 10);
    }

    #[test]
    fn paging_normalizes_start() {
        assert_eq!(Paging::from_params(Some("-4"), None).start, 0);
        assert_eq!(Paging::from_params(Some("7"), None).start, 7);
        assert_eq!(Paging::from_params(Some("seven"), None).start, 0);
    }

    #[test]
    fn payload_id_is_ignored() {
        let parsed: NewProduct = serde_json::from_str(r#"{"id": 99, "name": "lamp", "price": 12.5}"#).unwrap();
        let product = parsed.with_id(3);
        assert_eq!(product.id, 3);
        assert_eq!(product.to_string(), "ID[3] Name[lamp] Price[12.50]");
    }

    #[test]
    fn operation_names_are_distinct() {
        let mut metrics: Vec<_> = Operation::ALL.iter().map(|op| op.metric_name()).collect();
        metrics.sort_unstable();
        metrics.dedup();
        assert_eq!(metrics.len(), Operation::ALL.len());
    }
}
