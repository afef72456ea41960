use std::collections::BTreeMap;

use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    validation::{StockBulkRequest, StockUpdateRequest, ValidatedJson},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct StockUpdated {
    pub sku: String,
    pub stock: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockBulkUpdated {
    pub updated: usize,
}

pub fn stock_routes() -> Router<AppState> {
    Router::new().route("/", get(get_stock))
}

pub fn admin_stock_routes() -> Router<AppState> {
    Router::new().route("/", post(update_stock).put(bulk_update_stock))
}

/// Current stock per SKU
///
/// SKUs that were never written are absent; clients treat them as 1.
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    responses(
        (status = 200, description = "Stock map", body = crate::ApiResponse<BTreeMap<String, i64>>)
    ),
    tag = "stock"
)]
pub async fn get_stock(State(state): State<AppState>) -> Response {
    success_response(state.services.stock.levels().await)
}

/// Change one SKU's stock
///
/// `action` (increment/decrement) wins over `stock` when both are present.
/// Counts never go below zero.
#[utoipa::path(
    post,
    path = "/api/v1/admin/stock",
    request_body = StockUpdateRequest,
    responses(
        (status = 200, description = "Stored count", body = crate::ApiResponse<StockUpdated>),
        (status = 400, description = "Invalid SKU, or neither action nor stock given", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent writes kept conflicting", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<StockUpdateRequest>,
) -> Result<Response, ServiceError> {
    let stock = state
        .services
        .stock
        .update(&payload.sku, payload.action, payload.stock)
        .await?;
    Ok(success_response(StockUpdated {
        sku: payload.sku,
        stock,
    }))
}

/// Set absolute counts for many SKUs in one write
#[utoipa::path(
    put,
    path = "/api/v1/admin/stock",
    request_body = StockBulkRequest,
    responses(
        (status = 200, description = "Number of SKUs written", body = crate::ApiResponse<StockBulkUpdated>),
        (status = 400, description = "Invalid SKU", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn bulk_update_stock(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<StockBulkRequest>,
) -> Result<Response, ServiceError> {
    let updated = state.services.stock.bulk_set(&payload.stock_updates).await?;
    Ok(success_response(StockBulkUpdated { updated }))
}
