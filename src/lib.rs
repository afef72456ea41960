//! Gameshop Enter storefront backend
//!
//! Checkout payments, order reconciliation on gateway webhooks, stock,
//! shipments, discounts, reviews, wishlists and transactional email.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod store;
pub mod tracing;
pub mod validation;

use axum::{middleware, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::services::factory::ServiceFactory;
use crate::store::DocumentStore;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            config: factory.config().clone(),
            store: factory.store().clone(),
            services: handlers::AppServices::new(factory),
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}


/// Routes under `/api/v1`. Everything nested below `/admin` requires the
/// admin bearer token.
pub fn api_v1_routes(state: AppState) -> Router<AppState> {
    let email_admin = handlers::notifications::admin_email_routes()
        .nest("/outbox", handlers::outbox_admin::router());

    let admin = Router::new()
        .nest("/orders", handlers::orders::admin_order_routes())
        .nest("/stock", handlers::stock::admin_stock_routes())
        .nest("/discounts", handlers::discounts::admin_discount_routes())
        .nest("/shipments", handlers::shipments::admin_shipment_routes())
        .nest("/labels", handlers::shipments::admin_label_routes())
        .nest("/reviews", handlers::reviews::admin_review_routes())
        .nest("/email", email_admin)
        .route_layer(middleware::from_fn_with_state(
            state,
            middleware_helpers::admin_auth_middleware,
        ));

    Router::new()
        // Status endpoint
        .route("/status", get(handlers::health::api_status))
        // Checkout and payments
        .nest("/payments", handlers::payments::payment_routes())
        .nest("/orders", handlers::orders::order_routes())
        // Storefront
        .nest("/newsletter", handlers::discounts::newsletter_routes())
        .nest("/discounts", handlers::discounts::discount_routes())
        .nest("/stock", handlers::stock::stock_routes())
        .nest("/reviews", handlers::reviews::review_routes())
        .nest("/wishlist", handlers::wishlists::wishlist_routes())
        // Admin
        .nest("/admin", admin)
}

/// Full application router with shared middleware. CORS is added by the
/// binary since it depends on deployment configuration.
pub fn app_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .nest("/health", handlers::health::health_routes())
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes(state.clone()))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        // Ensure every request carries a request id for traceability
        .layer(middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
