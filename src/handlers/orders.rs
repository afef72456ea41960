use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::{
    errors::ServiceError,
    handlers::common::{created_or_existing, success_response},
    models::Order,
    services::orders::order_from_request,
    validation::{StoreOrderRequest, ValidatedJson},
    AppState,
};

/// Public: checkout stores the order before redirecting to the payment page.
pub fn order_routes() -> Router<AppState> {
    Router::new().route("/", post(store_order))
}

pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:order_number", get(get_order))
}

/// Store a checkout order
///
/// Storing an order number that already exists returns the stored copy
/// unchanged with status 200.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = StoreOrderRequest,
    responses(
        (status = 201, description = "Order stored", body = crate::ApiResponse<Order>),
        (status = 200, description = "Order already stored", body = crate::ApiResponse<Order>),
        (status = 400, description = "Invalid order or totals do not add up", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn store_order(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<StoreOrderRequest>,
) -> Result<Response, ServiceError> {
    let order = order_from_request(&payload)?;
    let stored = state.services.orders.create(order).await?;
    Ok(created_or_existing(stored.created, stored.order))
}

/// List all orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    responses(
        (status = 200, description = "Orders", body = crate::ApiResponse<Vec<Order>>),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list().await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{order_number}",
    params(("order_number" = String, Path, description = "Order number, e.g. GE-LX3K9A2B")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<Order>),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get(&order_number).await?;
    Ok(success_response(order))
}
