use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::{
        carrier::TrackingStatus,
        shipments::{label_reference, ShipmentResult},
    },
    validation::{CreateShipmentRequest, ValidatedJson},
    AppState,
};

pub fn admin_shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_shipment))
        .route("/:order_number/tracking", get(shipment_tracking))
}

pub fn admin_label_routes() -> Router<AppState> {
    Router::new().route("/:order_number", get(download_label))
}

/// Create a carrier label and mark the order shipped
#[utoipa::path(
    post,
    path = "/api/v1/admin/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Label created", body = crate::ApiResponse<ShipmentResult>),
        (status = 400, description = "Invalid request or order cannot ship", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse),
        (status = 500, description = "Carrier error, message passed through", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateShipmentRequest>,
) -> Result<Response, ServiceError> {
    let shipment = state.services.shipments.create_shipment(&payload).await?;
    Ok(created_response(shipment))
}

/// Live carrier status of a shipped order
#[utoipa::path(
    get,
    path = "/api/v1/admin/shipments/{order_number}/tracking",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Carrier status", body = crate::ApiResponse<TrackingStatus>),
        (status = 400, description = "Order not shipped yet", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn shipment_tracking(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Response, ServiceError> {
    let status = state.services.shipments.tracking(&order_number).await?;
    Ok(success_response(status))
}

/// Download a stored shipping label
#[utoipa::path(
    get,
    path = "/api/v1/admin/labels/{order_number}",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Label PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "No label stored", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn download_label(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Response, ServiceError> {
    let pdf = state.services.shipments.label_pdf(&order_number).await?;
    let disposition = format!("attachment; filename=\"{}\"", label_reference(&order_number));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
