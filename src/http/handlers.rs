//! Product route handlers.
//!
//! Thin adapters: extract, call [`ProductService`](crate::products::ProductService),
//! map the outcome to a response.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::http::request::Traced;
use crate::http::response::{ApiError, ErrorBody, ResultBody};
use crate::http::server::AppState;
use crate::products::{Operation, Paging};

/// Raw `start`/`count` query values; normalized by [`Paging::from_params`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub start: Option<String>,
    pub count: Option<String>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Traced(cx): Traced,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::from_params(params.start.as_deref(), params.count.as_deref());
    let products = state
        .service
        .list(paging, &cx)
        .await
        .map_err(|e| ApiError::new(Operation::GetProducts, e))?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Traced(cx): Traced,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Ok(unknown_route());
    };
    let product = state
        .service
        .get(id, &cx)
        .await
        .map_err(|e| ApiError::new(Operation::GetProduct, e))?;
    Ok(Json(product).into_response())
}

pub async fn create_product(
    State(state): State<AppState>,
    Traced(cx): Traced,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .service
        .create(&body, &cx)
        .await
        .map_err(|e| ApiError::new(Operation::CreateProduct, e))?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Traced(cx): Traced,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Ok(unknown_route());
    };
    let product = state
        .service
        .update(id, &body, &cx)
        .await
        .map_err(|e| ApiError::new(Operation::UpdateProduct, e))?;
    Ok(Json(product).into_response())
}

pub async fn delete_product(
    State(state): State<AppState>,
    Traced(cx): Traced,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(id) = parse_id(&id) else {
        return Ok(unknown_route());
    };
    state
        .service
        .delete(id, &cx)
        .await
        .map_err(|e| ApiError::new(Operation::DeleteProduct, e))?;
    Ok(Json(ResultBody::SUCCESS).into_response())
}

/// Product ids are unsigned decimal; anything else does not name a product route.
fn parse_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Body of the 404 sent for paths that do not name a product.
pub const UNKNOWN_ROUTE: &str = "page not found";

fn unknown_route() -> Response {
    let body = ErrorBody {
        error: UNKNOWN_ROUTE.to_string(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
