use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gameshop Enter API",
        version = "1.0.0",
        description = r#"
# Gameshop Enter storefront API

Checkout payments, order reconciliation, stock, shipments, discounts, reviews,
wishlists and transactional email for the Gameshop Enter webshop.

## Authentication

Endpoints under `/api/v1/admin` require the admin token:

```
Authorization: Bearer <admin-token>
```

## Error Handling

Failures share one body format:

```json
{
  "error": "Bad Request",
  "message": "Validatie mislukt",
  "errors": ["customer.postcode: Ongeldige postcode"],
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Business rejections (a used discount code, for example) are answered with
200 and `success: false`.
        "#,
        contact(
            name = "Gameshop Enter",
            email = "info@gameshopenter.nl",
            url = "https://gameshopenter.nl"
        )
    ),
    servers(
        (url = "https://gameshopenter.nl", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "payments", description = "Checkout payments and gateway webhooks"),
        (name = "orders", description = "Order storage"),
        (name = "discounts", description = "Newsletter codes and discount checks"),
        (name = "stock", description = "Stock levels"),
        (name = "reviews", description = "Product reviews"),
        (name = "wishlist", description = "Wishlist sync"),
        (name = "health", description = "Health check endpoints"),
        (name = "admin", description = "Administrative endpoints")
    ),
    paths(
        // Payments
        crate::handlers::payments::create_payment,
        crate::handlers::payments::get_payment_status,
        crate::handlers::payments::payment_webhook,

        // Orders
        crate::handlers::orders::store_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Discounts
        crate::handlers::discounts::newsletter_signup,
        crate::handlers::discounts::validate_discount,
        crate::handlers::discounts::redeem_discount,

        // Stock
        crate::handlers::stock::get_stock,
        crate::handlers::stock::update_stock,
        crate::handlers::stock::bulk_update_stock,

        // Shipments
        crate::handlers::shipments::create_shipment,
        crate::handlers::shipments::shipment_tracking,
        crate::handlers::shipments::download_label,

        // Reviews & wishlist
        crate::handlers::reviews::submit_review,
        crate::handlers::reviews::list_reviews,
        crate::handlers::reviews::approve_review,
        crate::handlers::wishlists::sync_wishlist,
        crate::handlers::wishlists::get_wishlist,

        // Email
        crate::handlers::notifications::send_email,
        crate::handlers::notifications::email_status,
        crate::handlers::notifications::email_stats,
        crate::handlers::notifications::send_abandoned_cart,
        crate::handlers::outbox_admin::list_outbox,
        crate::handlers::outbox_admin::retry_outbox,

        // Health
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::validation::CreatePaymentRequest,
            crate::validation::StoreOrderRequest,
            crate::validation::CreateShipmentRequest,
            crate::models::Order,
            crate::models::OrderStatus,
            crate::models::QueuedEmail,
            crate::models::EmailStats,
            crate::validation::AbandonedCartRequest,
            crate::services::checkout::CheckoutSession,
            crate::services::discounts::DiscountCheck,
            crate::notifications::DispatchOutcome,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
