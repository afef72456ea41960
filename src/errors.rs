use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::carrier::CarrierError;
use crate::services::payments::GatewayError;
use crate::store::StoreError;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Validatie mislukt",
    "errors": ["customer.postcode: Ongeldige postcode"],
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Bad Request")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Field-level validation messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Unique request identifier for support and debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validatie mislukt")]
    ValidationFailed(Vec<String>),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Payment provider error: {0}")]
    PaymentProviderError(#[from] GatewayError),

    #[error("Carrier error: {0}")]
    CarrierError(#[from] CarrierError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationFailed(crate::validation::flatten_errors(&err))
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationFailed(_) | Self::ValidationError(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::StoreError(StoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
            Self::StoreError(_)
            | Self::PaymentProviderError(_)
            | Self::CarrierError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::StoreError(StoreError::VersionConflict { .. }) => {
                "Gelijktijdige wijziging, probeer het opnieuw".to_string()
            }
            Self::StoreError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            // Collaborator messages are surfaced so operators can act on them
            Self::PaymentProviderError(err) => err.to_string(),
            Self::CarrierError(err) => err.to_string(),
            _ => self.to_string(),
        }
    }

    fn field_errors(&self) -> Option<Vec<String>> {
        match self {
            Self::ValidationFailed(errors) => Some(errors.clone()),
            Self::ValidationError(msg) => Some(vec![msg.clone()]),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            errors: self.field_errors(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
