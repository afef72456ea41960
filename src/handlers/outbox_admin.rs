use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    models::QueuedEmail,
    notifications::outbox::{self, OutboxStats},
    AppState,
};

/// Most recent entries returned by the listing.
const LIST_LIMIT: usize = 100;

#[derive(Serialize, ToSchema)]
pub struct OutboxOverview {
    pub stats: OutboxStats,
    pub items: Vec<QueuedEmail>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_outbox))
        .route("/:id/retry", post(retry_outbox))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/email/outbox",
    responses(
        (status = 200, description = "Queue statistics and the newest entries", body = crate::ApiResponse<OutboxOverview>)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_outbox(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let store = state.store.as_ref();
    let stats = outbox::stats(store).await?;
    let mut items = outbox::load_all(store).await?;
    items.reverse();
    items.truncate(LIST_LIMIT);
    Ok(success_response(OutboxOverview { stats, items }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/email/outbox/{id}/retry",
    params(
        ("id" = String, Path, description = "Outbox entry id")
    ),
    responses(
        (status = 200, description = "Entry scheduled for immediate retry", body = crate::ApiResponse<QueuedEmail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn retry_outbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let entry = outbox::retry_now(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("outbox {} not found", id)))?;
    Ok(success_response(entry))
}
