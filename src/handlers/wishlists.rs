use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::{
    errors::ServiceError,
    handlers::common::success_response,
    models::Wishlist,
    validation::{ValidatedJson, WishlistSyncRequest},
    AppState,
};

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_wishlist))
        .route("/:user_id", get(get_wishlist))
}

/// Replace a wishlist with the client's copy
///
/// Without a `userId` nothing is stored; the normalized list is echoed back.
#[utoipa::path(
    post,
    path = "/api/v1/wishlist/sync",
    request_body = WishlistSyncRequest,
    responses(
        (status = 200, description = "Wishlist synced", body = crate::ApiResponse<Wishlist>),
        (status = 400, description = "Invalid SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "wishlist"
)]
pub async fn sync_wishlist(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<WishlistSyncRequest>,
) -> Result<Response, ServiceError> {
    let wishlist = state
        .services
        .wishlists
        .sync(payload.user_id.as_deref(), payload.items)
        .await?;
    Ok(success_response(wishlist))
}

#[utoipa::path(
    get,
    path = "/api/v1/wishlist/{user_id}",
    params(("user_id" = String, Path, description = "Storefront user id")),
    responses(
        (status = 200, description = "Stored wishlist", body = crate::ApiResponse<Wishlist>),
        (status = 404, description = "No wishlist stored for this user", body = crate::errors::ErrorResponse)
    ),
    tag = "wishlist"
)]
pub async fn get_wishlist(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ServiceError> {
    let wishlist = state
        .services
        .wishlists
        .get(&user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Verlanglijst {} niet gevonden", user_id)))?;
    Ok(success_response(wishlist))
}
