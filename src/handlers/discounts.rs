use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    handlers::common::{rejected_response, success_response},
    models::discount::DISCOUNT_PERCENTAGE,
    services::discounts::{DiscountCheck, RedeemOutcome},
    validation::{DiscountRedeemRequest, DiscountValidateRequest, NewsletterSignup, ValidatedJson},
    ApiResponse, AppState,
};

pub const WELCOME_MESSAGE: &str =
    "Welkom! Je ontvangt een bevestigingsmail met je 10% kortingscode.";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterResponse {
    pub code: String,
    pub discount_percentage: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub code: String,
    pub order_number: String,
}

pub fn newsletter_routes() -> Router<AppState> {
    Router::new().route("/", post(newsletter_signup))
}

pub fn discount_routes() -> Router<AppState> {
    Router::new().route("/validate", post(validate_discount))
}

pub fn admin_discount_routes() -> Router<AppState> {
    Router::new().route("/redeem", post(redeem_discount))
}

/// Subscribe to the newsletter and receive a discount code
///
/// An address that still holds an unused code gets that code again.
#[utoipa::path(
    post,
    path = "/api/v1/newsletter",
    request_body = NewsletterSignup,
    responses(
        (status = 201, description = "Subscribed, new code issued", body = crate::ApiResponse<NewsletterResponse>),
        (status = 200, description = "Already subscribed, existing code returned", body = crate::ApiResponse<NewsletterResponse>),
        (status = 400, description = "Invalid email address", body = crate::errors::ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn newsletter_signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewsletterSignup>,
) -> Result<Response, ServiceError> {
    let (code, created) = state.services.discounts.issue_for(&payload.email).await?;

    if let Err(err) = state
        .services
        .notifications
        .send_welcome(&code.email, &code.code, DISCOUNT_PERCENTAGE)
        .await
    {
        error!(error = %err, "welcome email could not be sent or queued");
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = ApiResponse::success(NewsletterResponse {
        code: code.code,
        discount_percentage: DISCOUNT_PERCENTAGE,
    })
    .with_message(WELCOME_MESSAGE);
    Ok((status, Json(body)).into_response())
}

/// Check a discount code without consuming it
#[utoipa::path(
    post,
    path = "/api/v1/discounts/validate",
    request_body = DiscountValidateRequest,
    responses(
        (status = 200, description = "Check result; unknown and used codes report valid=false", body = DiscountCheck),
        (status = 400, description = "No code supplied", body = crate::errors::ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DiscountValidateRequest>,
) -> Result<Json<DiscountCheck>, ServiceError> {
    let check = state
        .services
        .discounts
        .validate(&payload.code, payload.subtotal)
        .await?;
    Ok(Json(check))
}

/// Mark a discount code as used for an order
#[utoipa::path(
    post,
    path = "/api/v1/admin/discounts/redeem",
    request_body = DiscountRedeemRequest,
    responses(
        (status = 200, description = "Redeemed, or success=false when the code is unknown or already used", body = crate::ApiResponse<RedeemResponse>),
        (status = 401, description = "Missing or wrong admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn redeem_discount(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DiscountRedeemRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .discounts
        .redeem(&payload.code, &payload.order_number)
        .await?;

    Ok(match outcome {
        RedeemOutcome::Redeemed => success_response(RedeemResponse {
            code: crate::models::discount::normalize_code(&payload.code),
            order_number: payload.order_number,
        }),
        rejected => rejected_response(rejected.message()),
    })
}
