use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::checkout::{CheckoutSession, PaymentStatusView},
    validation::{CreatePaymentRequest, ValidatedJson},
    AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_payment))
        .route("/webhook", post(payment_webhook))
        .route("/:id", get(get_payment_status))
}

/// Start a checkout payment
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = crate::ApiResponse<CheckoutSession>),
        (status = 400, description = "Invalid checkout payload", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment provider error", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentRequest>,
) -> Result<Response, ServiceError> {
    let session = state.services.checkout.create_payment(&payload).await?;
    Ok(created_response(session))
}

/// Look up a payment's status
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    params(("id" = String, Path, description = "Gateway payment id")),
    responses(
        (status = 200, description = "Payment status", body = crate::ApiResponse<PaymentStatusView>),
        (status = 400, description = "Malformed payment id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown payment", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let status = state.services.checkout.payment_status(&id).await?;
    Ok(success_response(status))
}

#[derive(Debug, Deserialize)]
struct WebhookJson {
    #[serde(default)]
    id: Option<String>,
}

/// Payment id from a gateway callback. The gateway posts `id=tr_xxx` form
/// encoded; a JSON `{"id": ...}` body is accepted as well.
pub fn webhook_payment_id(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);

    let id = if is_json {
        serde_json::from_slice::<WebhookJson>(body)
            .ok()
            .and_then(|parsed| parsed.id)
    } else {
        url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
    };

    id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}

/// Gateway payment notification
///
/// Always acknowledged once a payment id is present; processing problems are
/// logged and never surfaced to the gateway.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "id=<payment id>"),
    responses(
        (status = 200, description = "Notification acknowledged"),
        (status = 400, description = "No payment id in the body", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let payment_id = webhook_payment_id(&headers, &body).ok_or_else(|| {
        ServiceError::ValidationError("Geen betalings-ID ontvangen".to_string())
    })?;

    let outcome = state
        .services
        .reconciliation
        .handle_notification(&payment_id)
        .await;
    info!(%payment_id, outcome = outcome.label(), "payment webhook handled");

    Ok(Json(json!({ "success": true })).into_response())
}
