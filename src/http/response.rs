//! Response mapping.
//!
//! # Responsibilities
//! - Map operation failures to HTTP status codes
//! - Render every error as a JSON `{"error": "..."}` body
//!
//! # Status Codes
//! - 400: malformed payload
//! - 404: unknown product
//! - 500: data store failure
//! - 503: request cancelled or past its deadline

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::products::{Operation, ServiceError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ResultBody {
    pub result: &'static str,
}

impl ResultBody {
    pub const SUCCESS: ResultBody = ResultBody { result: "success" };
}

/// A failed operation, ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    operation: Operation,
    error: ServiceError,
}

impl ApiError {
    pub fn new(operation: Operation, error: ServiceError) -> Self {
        Self { operation, error }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            ServiceError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) if self.error.cancellation().is_some() => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.error.describe(self.operation),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::trace::context::Cancelled;

    fn status_of(error: ServiceError) -> StatusCode {
        ApiError::new(Operation::GetProduct, error).status()
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_of(ServiceError::InvalidPayload { reason: "eof".into() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ServiceError::NotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(StoreError::Unavailable("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(StoreError::Cancelled(Cancelled::Cancelled).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let response = ApiError::new(Operation::GetProduct, ServiceError::NotFound(3)).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Get product failed: product not found");
    }
}
