mod common;

use axum::http::{Method, StatusCode};
use rstest::rstest;
use serde_json::json;

use common::{TestApp, ADMIN_TOKEN};

#[rstest]
#[case(None)]
#[case(Some("wrong-token"))]
#[case(Some("test-admin-token-12345"))]
#[tokio::test]
async fn admin_routes_reject_missing_or_wrong_token(#[case] token: Option<&str>) {
    let app = TestApp::new();

    let (status, body) = app
        .request(Method::GET, "/api/v1/admin/orders", None, token)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Niet geautoriseerd");
}

#[tokio::test]
async fn unauthorized_admin_write_has_no_effect() {
    let app = TestApp::new();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": "GB-001", "stock": 7})),
            Some("nope"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = app.public(Method::GET, "/api/v1/stock", None).await;
    assert!(body["data"].get("GB-001").is_none());
}

#[tokio::test]
async fn admin_token_opens_admin_routes() {
    let app = TestApp::new();

    let (status, body) = app
        .request(Method::GET, "/api/v1/admin/orders", None, Some(ADMIN_TOKEN))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn invalid_body_lists_field_errors() {
    let app = TestApp::new();

    let (status, body) = app
        .public(
            Method::POST,
            "/api/v1/newsletter",
            Some(json!({"email": "geen-adres"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().expect("errors array");
    assert!(errors
        .iter()
        .any(|e| e.as_str().unwrap_or_default().contains("Ongeldig e-mailadres")));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn stock_updates_clamp_at_zero_and_action_wins() {
    let app = TestApp::new();

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": "GB-001", "stock": -4})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 0);

    app.admin(
        Method::POST,
        "/api/v1/admin/stock",
        Some(json!({"sku": "GB-001", "stock": 3})),
    )
    .await;

    // Both given: the action is applied, the absolute count ignored.
    let (_, body) = app
        .admin(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": "GB-001", "action": "increment", "stock": 50})),
        )
        .await;
    assert_eq!(body["data"]["stock"], 4);

    for _ in 0..6 {
        app.admin(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": "GB-001", "action": "decrement"})),
        )
        .await;
    }

    let (status, body) = app.public(Method::GET, "/api/v1/stock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["GB-001"], 0);
}

#[tokio::test]
async fn stock_update_needs_action_or_count() {
    let app = TestApp::new();

    let (status, _) = app
        .admin(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": "GB-001"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_stock_update_rejects_bad_skus_and_writes_good_ones() {
    let app = TestApp::new();

    let (status, _) = app
        .admin(
            Method::PUT,
            "/api/v1/admin/stock",
            Some(json!({"stockUpdates": {"gb 001": 3}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .admin(
            Method::PUT,
            "/api/v1/admin/stock",
            Some(json!({"stockUpdates": {"GB-001": 3, "GB-002": -1}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 2);

    let (_, body) = app.public(Method::GET, "/api/v1/stock", None).await;
    assert_eq!(body["data"]["GB-001"], 3);
    assert_eq!(body["data"]["GB-002"], 0);
}

#[tokio::test]
async fn newsletter_signup_issues_one_code_per_address() {
    let app = TestApp::new();

    let (status, first) = app
        .public(
            Method::POST,
            "/api/v1/newsletter",
            Some(json!({"email": "Speler@Example.nl"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = first["data"]["code"].as_str().expect("code").to_string();
    assert!(code.starts_with("GE-"));
    assert_eq!(first["data"]["discountPercentage"], 10);

    let (status, second) = app
        .public(
            Method::POST,
            "/api/v1/newsletter",
            Some(json!({"email": "speler@example.nl"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["code"], code.as_str());

    // The welcome mail goes out on every signup
    assert_eq!(app.email.sent_to("speler@example.nl"), 2);
}

#[tokio::test]
async fn discount_codes_validate_until_redeemed() {
    let app = TestApp::new();

    let (_, signup) = app
        .public(
            Method::POST,
            "/api/v1/newsletter",
            Some(json!({"email": "koper@example.nl"})),
        )
        .await;
    let code = signup["data"]["code"].as_str().expect("code").to_string();

    let (status, check) = app
        .public(
            Method::POST,
            "/api/v1/discounts/validate",
            Some(json!({"code": code.to_lowercase(), "subtotal": 50})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["valid"], true);
    assert_eq!(check["discountPercentage"], 10);
    assert_eq!(check["discountAmount"], 5.0);

    // Validation does not consume the code
    let (_, check) = app
        .public(
            Method::POST,
            "/api/v1/discounts/validate",
            Some(json!({"code": code})),
        )
        .await;
    assert_eq!(check["valid"], true);

    let (status, redeemed) = app
        .admin(
            Method::POST,
            "/api/v1/admin/discounts/redeem",
            Some(json!({"code": code, "orderNumber": "GE-ORDER1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redeemed["success"], true);

    let (status, again) = app
        .admin(
            Method::POST,
            "/api/v1/admin/discounts/redeem",
            Some(json!({"code": code, "orderNumber": "GE-ORDER2"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["success"], false);
    assert_eq!(again["message"], "Deze code is al gebruikt");

    let (_, check) = app
        .public(
            Method::POST,
            "/api/v1/discounts/validate",
            Some(json!({"code": code})),
        )
        .await;
    assert_eq!(check["valid"], false);
    assert_eq!(check["message"], "Deze code is al gebruikt");
}

#[tokio::test]
async fn unknown_discount_code_is_rejected_without_error_status() {
    let app = TestApp::new();

    let (status, check) = app
        .public(
            Method::POST,
            "/api/v1/discounts/validate",
            Some(json!({"code": "GE-NOPE00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["valid"], false);

    let (status, redeem) = app
        .admin(
            Method::POST,
            "/api/v1/admin/discounts/redeem",
            Some(json!({"code": "GE-NOPE00", "orderNumber": "GE-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redeem["success"], false);
    assert_eq!(redeem["message"], "Code niet gevonden");
}

#[tokio::test]
async fn reviews_are_hidden_until_approved() {
    let app = TestApp::new();

    let (status, submitted) = app
        .public(
            Method::POST,
            "/api/v1/reviews",
            Some(json!({
                "sku": "GB-010",
                "rating": 4,
                "title": "Klassieker",
                "comment": "Werkt nog perfect, snel geleverd.",
                "author": "Sanne",
                "email": "sanne@example.nl"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(submitted["data"].get("email").is_none());
    let id = submitted["data"]["id"].as_str().expect("id").to_string();

    let (_, listed) = app
        .public(Method::GET, "/api/v1/reviews?sku=GB-010", None)
        .await;
    assert_eq!(listed["data"]["total"], 0);

    let (status, _) = app
        .admin(Method::POST, &format!("/api/v1/admin/reviews/{}/approve", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = app
        .public(Method::GET, "/api/v1/reviews?sku=GB-010", None)
        .await;
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["averageRating"], 4.0);
}

#[tokio::test]
async fn review_listing_checks_the_sku() {
    let app = TestApp::new();

    let (status, _) = app
        .public(Method::GET, "/api/v1/reviews?sku=gb%20010", None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wishlist_sync_replaces_the_stored_list() {
    let app = TestApp::new();

    app.public(
        Method::POST,
        "/api/v1/wishlist/sync",
        Some(json!({"userId": "user-1", "items": [{"sku": "GB-001"}, {"sku": "GB-002"}]})),
    )
    .await;
    let (status, _) = app
        .public(
            Method::POST,
            "/api/v1/wishlist/sync",
            Some(json!({"userId": "user-1", "items": [{"sku": "GB-003"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.public(Method::GET, "/api/v1/wishlist/user-1", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["sku"], "GB-003");

    let (status, _) = app.public(Method::GET, "/api/v1/wishlist/onbekend", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn abandoned_cart(reminder: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "customerEmail": "twijfelaar@example.nl",
        "customerName": "Noor",
        "cartItems": [{"name": "Metroid Fusion", "quantity": 1, "price": 39.95}],
        "cartTotal": 39.95,
        "cartUrl": "https://gameshopenter.nl/winkelwagen"
    });
    if let Some(reminder) = reminder {
        body["reminderType"] = json!(reminder);
    }
    body
}

#[tokio::test]
async fn abandoned_cart_reminder_is_sent() {
    let app = TestApp::new();

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/v1/admin/email/abandoned-cart",
            Some(abandoned_cart(None)),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reminderType"], "first");
    assert_eq!(body["data"]["queued"], false);
    assert!(body["data"]["messageId"].as_str().is_some());

    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "twijfelaar@example.nl");
    assert!(sent[0]
        .text
        .as_deref()
        .unwrap_or_default()
        .contains("5 minuten geleden"));
}

#[tokio::test]
async fn abandoned_cart_rejects_bad_input() {
    let app = TestApp::new();

    let mut body = abandoned_cart(Some("third"));
    body["cartUrl"] = json!("geen url");
    let (status, response) = app
        .admin(Method::POST, "/api/v1/admin/email/abandoned-cart", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["errors"].as_array().is_some());

    let (status, _) = app
        .admin(
            Method::POST,
            "/api/v1/admin/email/abandoned-cart",
            Some(abandoned_cart(Some("fourth"))),
        )
        .await;
    assert!(status.is_client_error());

    let (status, _) = app
        .public(
            Method::POST,
            "/api/v1/admin/email/abandoned-cart",
            Some(abandoned_cart(None)),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn email_stats_report_delivery_outcomes() {
    let app = TestApp::new();

    app.admin(
        Method::POST,
        "/api/v1/admin/email/abandoned-cart",
        Some(abandoned_cart(None)),
    )
    .await;
    app.email.set_failing(true);
    let (_, queued) = app
        .admin(
            Method::POST,
            "/api/v1/admin/email/abandoned-cart",
            Some(abandoned_cart(Some("second"))),
        )
        .await;
    assert_eq!(queued["data"]["queued"], true);

    let (status, body) = app.admin(Method::GET, "/api/v1/admin/email/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalSent"], 2);
    assert_eq!(stats["sentToday"], 2);
    assert_eq!(stats["successCount"], 1);
    assert_eq!(stats["failureCount"], 0);
    assert_eq!(stats["successRate"], "50.00%");
    assert_eq!(stats["recentStatuses"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn health_reports_store_status() {
    let app = TestApp::new();

    let (status, body) = app.public(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["store"]["status"], "up");

    let (status, body) = app.public(Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "gameshop-api");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();

    let (status, body) = app
        .public(Method::GET, "/api-docs/openapi.json", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Gameshop Enter API");
}
