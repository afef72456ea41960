use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ApiResponse;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// 201 for a new resource, 200 when the request matched an existing one.
pub fn created_or_existing<T: Serialize>(created: bool, data: T) -> Response {
    if created {
        created_response(data)
    } else {
        success_response(data)
    }
}

/// Business rejection: the request was well-formed but refused.
pub fn rejected_response(message: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::<()>::error(message.into()))).into_response()
}
