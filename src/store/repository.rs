//! Instrumented access to the data store.
//!
//! # Responsibilities
//! - Wrap every store call in a child span named after the call
//! - Tag and log the call's parameters on that span
//! - Refuse to start delegated work once the request is cancelled or past
//!   its deadline
//!
//! # Design Decisions
//! - The cancellation check runs inside the span, so a refused call still
//!   leaves a finalized span with an `error` tag
//! - Rows-affected semantics are left to the caller

use std::sync::Arc;

use crate::products::model::{NewProduct, Paging, Product};
use crate::store::{Command, DataStore, Execution, Query, StoreError};
use crate::trace::context::RequestContext;
use crate::trace::instrument::Instrumented;
use crate::trace::span::{SpanGuard, Tracer};

/// Product table access on top of a [`DataStore`].
#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn DataStore>,
    tracer: Tracer,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn DataStore>, tracer: Tracer) -> Self {
        Self { store, tracer }
    }

    pub async fn list(&self, paging: Paging, cx: &RequestContext) -> Result<Vec<Product>, StoreError> {
        let query = Query::ListProducts {
            start: paging.start,
            count: paging.count,
        };
        Instrumented::new(&self.tracer, "get-products-db")
            .tag("query", query.statement())
            .tag("count", paging.count)
            .tag("start", paging.start)
            .log("query", query.statement())
            .log("count", paging.count)
            .log("start", paging.start)
            .run(
                cx,
                |cx| self.query(query, cx),
                |span, result| match result {
                    Ok(products) => {
                        span.set_tag("products-found", products.len());
                        span.log_kv([("products-found", products.len())]);
                    }
                    Err(e) => record_failure(span, e),
                },
            )
            .await
    }

    /// Fetch one product. `Ok(None)` when no row has `id`.
    pub async fn get(&self, id: u64, cx: &RequestContext) -> Result<Option<Product>, StoreError> {
        let rows = Instrumented::new(&self.tracer, "get-product-db")
            .tag("product-id", id)
            .log("product-id", id)
            .run(
                cx,
                |cx| self.query(Query::GetProduct { id }, cx),
                |span, result| {
                    if let Err(e) = result {
                        record_failure(span, e);
                    }
                },
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn create(&self, product: NewProduct, cx: &RequestContext) -> Result<Product, StoreError> {
        let description = product.to_string();
        let execution = Instrumented::new(&self.tracer, "create-product-db")
            .tag("product", description.clone())
            .log("product", description)
            .run(
                cx,
                |cx| self.execute(Command::InsertProduct(product), cx),
                |span, result| match result {
                    Ok(Execution {
                        returned: Some(created), ..
                    }) => span.set_tag("product-id", created.id),
                    Ok(_) => {}
                    Err(e) => record_failure(span, e),
                },
            )
            .await?;
        execution
            .returned
            .ok_or_else(|| StoreError::Query("insert returned no row".into()))
    }

    /// Overwrite the row with `product.id`. Returns rows affected.
    pub async fn update(&self, product: Product, cx: &RequestContext) -> Result<u64, StoreError> {
        let description = product.to_string();
        self.write("update-product-db", Command::UpdateProduct(product), cx, |op| {
            op.tag("product", description.clone()).log("product", description)
        })
        .await
    }

    /// Delete the row with `id`. Returns rows affected.
    pub async fn delete(&self, id: u64, cx: &RequestContext) -> Result<u64, StoreError> {
        self.write("delete-product-db", Command::DeleteProduct { id }, cx, |op| {
            op.tag("product-id", id).log("product-id", id)
        })
        .await
    }

    /// Delete every row. Returns rows affected.
    pub async fn delete_all(&self, cx: &RequestContext) -> Result<u64, StoreError> {
        let command = Command::DeleteAllProducts;
        let statement = command.statement();
        self.write("delete-products-db", command, cx, |op| op.tag("query", statement))
            .await
    }

    async fn write<'t, D>(
        &'t self,
        operation: &'static str,
        command: Command,
        cx: &RequestContext,
        describe: D,
    ) -> Result<u64, StoreError>
    where
        D: FnOnce(Instrumented<'t>) -> Instrumented<'t>,
    {
        let execution = describe(Instrumented::new(&self.tracer, operation))
            .run(
                cx,
                |cx| self.execute(command, cx),
                |span, result| match result {
                    Ok(execution) => span.set_tag("rows-affected", execution.rows_affected),
                    Err(e) => record_failure(span, e),
                },
            )
            .await?;
        Ok(execution.rows_affected)
    }

    async fn query(&self, query: Query, cx: RequestContext) -> Result<Vec<Product>, StoreError> {
        cx.check()?;
        self.store.query(query, &cx).await
    }

    async fn execute(&self, command: Command, cx: RequestContext) -> Result<Execution, StoreError> {
        cx.check()?;
        self.store.execute(command, &cx).await
    }
}

fn record_failure(span: &mut SpanGuard, error: &StoreError) {
    span.record_error(error.to_string());
}
