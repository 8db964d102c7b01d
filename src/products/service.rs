//! Product operations as served over REST.
//!
//! # Responsibilities
//! - Open one handler span per operation under the inbound trace
//! - Validate payloads and map store results onto operation outcomes
//! - Tag each outcome on the handler span
//! - Record one metric sample per operation, on every exit path
//!
//! # Design Decisions
//! - Payload parsing happens inside the handler span so malformed requests
//!   are traced and counted like any other failure
//! - Missing rows on update/delete are reported as not found

use std::sync::Arc;

use crate::observability::metrics::MetricsRecorder;
use crate::products::model::{NewProduct, Operation, Paging, Product};
use crate::store::{ProductRepository, StoreError};
use crate::trace::context::{Cancelled, RequestContext};
use crate::trace::instrument::Instrumented;
use crate::trace::span::{SpanGuard, TagValue, Tracer};

/// Failure of a product operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid request payload")]
    InvalidPayload { reason: String },
    #[error("product not found")]
    NotFound(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// The request was abandoned rather than failed.
    pub fn cancellation(&self) -> Option<Cancelled> {
        match self {
            ServiceError::Store(StoreError::Cancelled(c)) => Some(*c),
            _ => None,
        }
    }

    /// Message reported to the client and tagged on the handler span.
    pub fn describe(&self, operation: Operation) -> String {
        format!("{}: {}", operation.failure_prefix(), self)
    }
}

/// Product CRUD with tracing and metrics.
#[derive(Clone)]
pub struct ProductService {
    repo: ProductRepository,
    tracer: Tracer,
    metrics: Arc<MetricsRecorder>,
    service_name: Arc<str>,
}

impl ProductService {
    pub fn new(
        repo: ProductRepository,
        tracer: Tracer,
        metrics: Arc<MetricsRecorder>,
        service_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            repo,
            tracer,
            metrics,
            service_name: service_name.into(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub async fn list(&self, paging: Paging, cx: &RequestContext) -> Result<Vec<Product>, ServiceError> {
        tracing::info!(start = paging.start, count = paging.count, "Get products");
        self.observe(
            Operation::GetProducts,
            self.handler(Operation::GetProducts),
            cx,
            |cx| self.page(paging, cx),
            |span, products: &Vec<Product>| {
                span.set_tag("products-found", products.len());
                span.log_kv([("products-found", products.len())]);
            },
        )
        .await
    }

    pub async fn get(&self, id: u64, cx: &RequestContext) -> Result<Product, ServiceError> {
        tracing::info!(product_id = id, "Get product by ID");
        self.observe(
            Operation::GetProduct,
            self.handler(Operation::GetProduct).tag("product-id", id),
            cx,
            |cx| self.fetch(id, cx),
            |span, _: &Product| {
                span.set_tag("product-found", true);
                span.log_kv([("product-id", TagValue::from(id)), ("product-found", TagValue::from(true))]);
            },
        )
        .await
    }

    /// Create a product from a JSON body.
    pub async fn create(&self, body: &[u8], cx: &RequestContext) -> Result<Product, ServiceError> {
        self.observe(
            Operation::CreateProduct,
            self.handler(Operation::CreateProduct),
            cx,
            |cx| self.insert(body, cx),
            |span, product: &Product| record_written(span, "product-created", product),
        )
        .await
    }

    /// Replace the product `id` with a JSON body.
    pub async fn update(&self, id: u64, body: &[u8], cx: &RequestContext) -> Result<Product, ServiceError> {
        self.observe(
            Operation::UpdateProduct,
            self.handler(Operation::UpdateProduct).tag("product-id", id),
            cx,
            |cx| self.replace(id, body, cx),
            |span, product: &Product| record_written(span, "product-updated", product),
        )
        .await
    }

    pub async fn delete(&self, id: u64, cx: &RequestContext) -> Result<(), ServiceError> {
        tracing::info!(product_id = id, "Delete product by ID");
        self.observe(
            Operation::DeleteProduct,
            self.handler(Operation::DeleteProduct).tag("product-id", id),
            cx,
            |cx| self.remove(id, cx),
            |span, _: &()| {
                span.set_tag("product-deleted", true);
                span.log_kv([("product-deleted", true)]);
            },
        )
        .await
    }

    fn handler(&self, operation: Operation) -> Instrumented<'_> {
        Instrumented::new(&self.tracer, operation.span_name()).tag("app", &*self.service_name)
    }

    async fn observe<'s, T, F, Fut, S>(
        &'s self,
        operation: Operation,
        instrumented: Instrumented<'s>,
        cx: &RequestContext,
        body: F,
        on_success: S,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
        S: FnOnce(&mut SpanGuard, &T),
    {
        let _timer = self.metrics.start_timer(operation.metric_name());
        instrumented
            .run(cx, body, |span, result| match result {
                Ok(value) => on_success(span, value),
                Err(e) => record_failure(span, operation, e),
            })
            .await
    }

    async fn page(&self, paging: Paging, cx: RequestContext) -> Result<Vec<Product>, ServiceError> {
        Ok(self.repo.list(paging, &cx).await?)
    }

    async fn fetch(&self, id: u64, cx: RequestContext) -> Result<Product, ServiceError> {
        self.repo.get(id, &cx).await?.ok_or(ServiceError::NotFound(id))
    }

    async fn insert(&self, body: &[u8], cx: RequestContext) -> Result<Product, ServiceError> {
        let product = parse_payload(body)?;
        tracing::info!(product = %product, "Create product");
        Ok(self.repo.create(product, &cx).await?)
    }

    async fn replace(&self, id: u64, body: &[u8], cx: RequestContext) -> Result<Product, ServiceError> {
        let product = parse_payload(body)?.with_id(id);
        tracing::info!(product = %product, "Update product");
        match self.repo.update(product.clone(), &cx).await? {
            0 => Err(ServiceError::NotFound(id)),
            _ => Ok(product),
        }
    }

    async fn remove(&self, id: u64, cx: RequestContext) -> Result<(), ServiceError> {
        match self.repo.delete(id, &cx).await? {
            0 => Err(ServiceError::NotFound(id)),
            _ => Ok(()),
        }
    }
}

fn parse_payload(body: &[u8]) -> Result<NewProduct, ServiceError> {
    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidPayload { reason: e.to_string() })
}

fn record_written(span: &mut SpanGuard, outcome_tag: &'static str, product: &Product) {
    let description = product.to_string();
    span.set_tag("product", description.clone());
    span.set_tag(outcome_tag, true);
    span.log_kv([
        ("product", TagValue::from(description)),
        (outcome_tag, TagValue::from(true)),
    ]);
}

fn record_failure(span: &mut SpanGuard, operation: Operation, error: &ServiceError) {
    let message = error.describe(operation);
    let outcome = match operation {
        Operation::GetProducts => TagValue::Int(0),
        _ => TagValue::Bool(false),
    };
    if let ServiceError::InvalidPayload { reason } = error {
        tracing::debug!(operation = %operation, reason = %reason, "Rejected payload");
    }
    tracing::warn!(operation = %operation, error = %message, "Operation failed");

    span.set_tag(operation.outcome_tag(), outcome.clone());
    span.set_tag("error", message.clone());
    span.log_kv([
        (operation.outcome_tag(), outcome),
        ("error", TagValue::from(message)),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::trace::context::SpanContext;
    use crate::trace::memory::MemorySink;

    struct Fixture {
        service: ProductService,
        sink: Arc<MemorySink>,
        metrics: Arc<MetricsRecorder>,
    }

    fn fixture() -> Fixture {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());
        let metrics = Arc::new(MetricsRecorder::new());
        let repo = ProductRepository::new(Arc::new(MemoryStore::new()), tracer.clone());
        Fixture {
            service: ProductService::new(repo, tracer, metrics.clone(), "product-service"),
            sink,
            metrics,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let f = fixture();
        let cx = RequestContext::background();

        let created = f
            .service
            .create(br#"{"name":"lamp","price":12.5}"#, &cx)
            .await
            .unwrap();
        let fetched = f.service.get(created.id, &cx).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(f.metrics.invocations("createProduct"), 1);
        assert_eq!(f.metrics.invocations("getProduct"), 1);
    }

    #[tokio::test]
    async fn handler_span_parents_store_span() {
        let f = fixture();
        let inbound = SpanContext::root();
        let cx = RequestContext::background().with_span(inbound);

        f.service.list(Paging::default(), &cx).await.unwrap();

        let handler = &f.sink.named("get-products-handler")[0];
        let db = &f.sink.named("get-products-db")[0];
        assert_eq!(handler.context.parent_span_id, Some(inbound.span_id));
        assert_eq!(db.context.parent_span_id, Some(handler.context.span_id));
        assert_eq!(handler.tag("app"), Some(&TagValue::from("product-service")));
        assert_eq!(handler.tag("products-found"), Some(&TagValue::Int(0)));
    }

    #[tokio::test]
    async fn malformed_payload_is_traced_and_counted() {
        let f = fixture();

        let err = f
            .service
            .create(b"{not json", &RequestContext::background())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidPayload { .. }));
        let span = &f.sink.named("create-product-handler")[0];
        assert_eq!(
            span.tag("error").and_then(TagValue::as_str),
            Some("Create product failed: invalid request payload")
        );
        assert_eq!(span.tag("product-created"), Some(&TagValue::Bool(false)));
        // Never reached the store.
        assert!(f.sink.named("create-product-db").is_empty());
        assert_eq!(f.metrics.invocations("createProduct"), 1);
    }

    #[tokio::test]
    async fn missing_product_is_not_found_everywhere() {
        let f = fixture();
        let cx = RequestContext::background();

        assert_eq!(f.service.get(5, &cx).await, Err(ServiceError::NotFound(5)));
        assert_eq!(
            f.service.update(5, br#"{"name":"x","price":1}"#, &cx).await,
            Err(ServiceError::NotFound(5))
        );
        assert_eq!(f.service.delete(5, &cx).await, Err(ServiceError::NotFound(5)));

        let span = &f.sink.named("get-product-handler")[0];
        assert_eq!(span.tag("product-found"), Some(&TagValue::Bool(false)));
        assert_eq!(span.tag("product-id"), Some(&TagValue::Int(5)));
    }

    #[tokio::test]
    async fn update_and_delete_existing_product() {
        let f = fixture();
        let cx = RequestContext::background();
        let created = f
            .service
            .create(br#"{"name":"lamp","price":12.5}"#, &cx)
            .await
            .unwrap();

        let updated = f
            .service
            .update(created.id, br#"{"id":999,"name":"desk lamp","price":20}"#, &cx)
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "desk lamp");

        f.service.delete(created.id, &cx).await.unwrap();
        assert_eq!(f.service.get(created.id, &cx).await, Err(ServiceError::NotFound(created.id)));

        let span = &f.sink.named("delete-product-handler")[0];
        assert_eq!(span.tag("product-deleted"), Some(&TagValue::Bool(true)));
    }

    #[tokio::test]
    async fn nested_store_calls_do_not_record_metrics() {
        let f = fixture();
        f.service
            .list(Paging::default(), &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(f.metrics.invocations("getProducts"), 1);
        assert_eq!(f.metrics.invocations("get-products-db"), 0);
    }

    #[test]
    fn cancellation_is_distinguished() {
        let err = ServiceError::from(StoreError::Cancelled(Cancelled::DeadlineExceeded));
        assert_eq!(err.cancellation(), Some(Cancelled::DeadlineExceeded));
        assert_eq!(ServiceError::NotFound(1).cancellation(), None);
    }
}
