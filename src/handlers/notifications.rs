use axum::{
    extract::{Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    models::{EmailKind, EmailMessage, EmailStats, EmailStatusRecord, ReminderType},
    notifications::DispatchOutcome,
    validation::{AbandonedCartRequest, SendEmailRequest, ValidatedJson},
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct EmailStatusQuery {
    /// Id returned by the send endpoint
    pub message_id: String,
}

pub fn admin_email_routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_email))
        .route("/status", get(email_status))
        .route("/stats", get(email_stats))
        .route("/abandoned-cart", post(send_abandoned_cart))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCartReceipt {
    pub message_id: String,
    /// True when the first attempt failed and the reminder waits in the outbox
    pub queued: bool,
    pub customer_email: String,
    pub reminder_type: ReminderType,
    pub timestamp: DateTime<Utc>,
}

/// Send an ad-hoc email
///
/// A failed first attempt is queued for retry and reported with status
/// `queued`; the request still succeeds.
#[utoipa::path(
    post,
    path = "/api/v1/admin/email/send",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Sent or queued", body = crate::ApiResponse<DispatchOutcome>),
        (status = 400, description = "Invalid email", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn send_email(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SendEmailRequest>,
) -> Result<Response, ServiceError> {
    let message = EmailMessage {
        to: payload.to,
        subject: payload.subject,
        html: payload.html,
        text: payload.text,
        reply_to: payload.reply_to,
    };
    let outcome = state
        .services
        .notifications
        .dispatch(EmailKind::Generic, message)
        .await?;
    Ok(success_response(outcome))
}

/// Delivery status of a message
#[utoipa::path(
    get,
    path = "/api/v1/admin/email/status",
    params(EmailStatusQuery),
    responses(
        (status = 200, description = "Status record", body = crate::ApiResponse<EmailStatusRecord>),
        (status = 404, description = "Unknown message id", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn email_status(
    State(state): State<AppState>,
    Query(query): Query<EmailStatusQuery>,
) -> Result<Response, ServiceError> {
    let record = state
        .services
        .notifications
        .email_status(&query.message_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Bericht {} niet gevonden", query.message_id))
        })?;
    Ok(success_response(record))
}

/// Delivery statistics over all recorded messages
#[utoipa::path(
    get,
    path = "/api/v1/admin/email/stats",
    responses(
        (status = 200, description = "Counts, success rate and the latest records", body = crate::ApiResponse<EmailStats>)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn email_stats(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let stats = state.services.notifications.email_stats().await?;
    Ok(success_response(stats))
}

/// Send an abandoned-cart reminder
#[utoipa::path(
    post,
    path = "/api/v1/admin/email/abandoned-cart",
    request_body = AbandonedCartRequest,
    responses(
        (status = 200, description = "Reminder sent or queued", body = crate::ApiResponse<AbandonedCartReceipt>),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn send_abandoned_cart(
    State(state): State<AppState>,
    ValidatedJson(cart): ValidatedJson<AbandonedCartRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .notifications
        .send_abandoned_cart(&cart)
        .await?;
    Ok(success_response(AbandonedCartReceipt {
        message_id: outcome.message_id().to_string(),
        queued: !outcome.is_sent(),
        customer_email: cart.customer_email,
        reminder_type: cart.reminder_type,
        timestamp: Utc::now(),
    }))
}
