use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    models::{PublicReview, Review, ReviewSummary},
    validation::{ReviewSubmission, ValidatedJson, SKU_REGEX},
    ApiResponse, AppState,
};

pub const REVIEW_RECEIVED_MESSAGE: &str =
    "Bedankt voor je review! Hij verschijnt na goedkeuring op de productpagina.";

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReviewQuery {
    /// Product SKU
    pub sku: String,
}

pub fn review_routes() -> Router<AppState> {
    Router::new().route("/", post(submit_review).get(list_reviews))
}

pub fn admin_review_routes() -> Router<AppState> {
    Router::new().route("/:id/approve", post(approve_review))
}

/// Submit a product review
#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = ReviewSubmission,
    responses(
        (status = 201, description = "Review stored, awaiting approval", body = crate::ApiResponse<PublicReview>),
        (status = 400, description = "Invalid review", body = crate::errors::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ReviewSubmission>,
) -> Result<Response, ServiceError> {
    let review = state.services.reviews.submit(&payload).await?;
    let body = ApiResponse::success(PublicReview::from(&review)).with_message(REVIEW_RECEIVED_MESSAGE);
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// Approved reviews and rating summary for a product
#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    params(ReviewQuery),
    responses(
        (status = 200, description = "Review summary", body = crate::ApiResponse<ReviewSummary>),
        (status = 400, description = "Invalid SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Response, ServiceError> {
    if !SKU_REGEX.is_match(&query.sku) {
        return Err(ServiceError::ValidationError("sku: Ongeldige SKU".to_string()));
    }
    let summary = state.services.reviews.summary(&query.sku).await?;
    Ok(success_response(summary))
}

/// Publish a pending review
#[utoipa::path(
    post,
    path = "/api/v1/admin/reviews/{id}/approve",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review approved", body = crate::ApiResponse<Review>),
        (status = 404, description = "Unknown review", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn approve_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let review = state.services.reviews.approve(&id).await?;
    Ok(success_response(review))
}
