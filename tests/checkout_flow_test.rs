mod common;

use axum::{
    body::{self, Body},
    http::{header, Method, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use gameshop_api::{notifications::outbox, services::payments::PaymentStatus};

use common::{TestApp, ADMIN_TOKEN, LABEL_PDF};

const CUSTOMER_EMAIL: &str = "jan@example.nl";

fn checkout_body(discount_code: Option<&str>, discount: f64, total: f64) -> Value {
    json!({
        "items": [
            {"name": "Tetris", "sku": "GB-010", "quantity": 2, "price": 20}
        ],
        "customer": {
            "voornaam": "Jan",
            "achternaam": "de Vries",
            "email": CUSTOMER_EMAIL,
            "straat": "Dorpsstraat",
            "huisnummer": "12a",
            "postcode": "1234 ab",
            "plaats": "Enter",
            "betaalmethode": "ideal"
        },
        "shipping": 5,
        "discount": discount,
        "discountCode": discount_code,
        "total": total
    })
}

async fn set_stock(app: &TestApp, sku: &str, count: i64) {
    let (status, _) = app
        .admin(
            Method::POST,
            "/api/v1/admin/stock",
            Some(json!({"sku": sku, "stock": count})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn checkout_creates_a_gateway_payment() {
    let app = TestApp::new();

    let (status, body) = app
        .public(
            Method::POST,
            "/api/v1/payments",
            Some(checkout_body(None, 0.0, 45.0)),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["paymentId"], "tr_test1");
    assert_eq!(data["checkoutUrl"], "https://pay.example/tr_test1");
    assert!(data["orderNumber"].as_str().unwrap().starts_with("GE-"));

    let created = app.gateway.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].amount.value, "45.00");
    assert_eq!(created[0].metadata["orderNumber"], data["orderNumber"]);
    assert_eq!(created[0].metadata["postcode"], "1234 AB");

    let (status, body) = app
        .public(Method::GET, "/api/v1/payments/tr_test1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paid"], false);
    assert_eq!(body["data"]["status"], "open");
}

#[tokio::test]
async fn checkout_rejects_a_total_that_does_not_add_up() {
    let app = TestApp::new();

    let (status, body) = app
        .public(
            Method::POST,
            "/api/v1/payments",
            Some(checkout_body(None, 0.0, 99.0)),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().expect("errors");
    assert!(errors[0].as_str().unwrap().starts_with("total:"));
    assert!(app.gateway.created().is_empty());
}

#[tokio::test]
async fn payment_status_checks_the_id_format() {
    let app = TestApp::new();

    let (status, _) = app
        .public(Method::GET, "/api/v1/payments/tr-bad!id", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .public(Method::GET, "/api/v1/payments/tr_unknown", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_without_payment_id_is_a_bad_request() {
    let app = TestApp::new();

    let (status, body) = app.webhook_form("").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], "Geen betalings-ID ontvangen");

    let (status, _) = app
        .public(
            Method::POST,
            "/api/v1/payments/webhook",
            Some(json!({"id": "  "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_for_unknown_or_unpaid_payment_is_acknowledged_without_order() {
    let app = TestApp::new();

    let (status, body) = app.webhook_form("tr_missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    app.public(
        Method::POST,
        "/api/v1/payments",
        Some(checkout_body(None, 0.0, 45.0)),
    )
    .await;
    let (status, _) = app.webhook_form("tr_test1").await;
    assert_eq!(status, StatusCode::OK);

    let (_, orders) = app.admin(Method::GET, "/api/v1/admin/orders", None).await;
    assert_eq!(orders["data"], json!([]));
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn paid_webhook_is_processed_exactly_once() {
    let app = TestApp::new();
    set_stock(&app, "GB-010", 5).await;

    let (_, signup) = app
        .public(
            Method::POST,
            "/api/v1/newsletter",
            Some(json!({"email": "fan@example.nl"})),
        )
        .await;
    let code = signup["data"]["code"].as_str().expect("code").to_string();

    let (_, session) = app
        .public(
            Method::POST,
            "/api/v1/payments",
            Some(checkout_body(Some(&code), 4.0, 41.0)),
        )
        .await;
    let order_number = session["data"]["orderNumber"].as_str().unwrap().to_string();
    app.gateway.set_status("tr_test1", PaymentStatus::Paid);

    let (first, _) = app.webhook_form("tr_test1").await;
    let (second, _) = app.webhook_form("tr_test1").await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);

    let (_, orders) = app.admin(Method::GET, "/api/v1/admin/orders", None).await;
    let orders = orders["data"].as_array().expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["orderNumber"], order_number.as_str());
    assert_eq!(orders[0]["paymentId"], "tr_test1");
    assert_eq!(orders[0]["total"], 41.0);
    assert_eq!(orders[0]["discountCode"], code.as_str());

    // One confirmation for the customer despite two deliveries
    assert_eq!(app.email.sent_to(CUSTOMER_EMAIL), 1);

    let (_, stock) = app.public(Method::GET, "/api/v1/stock", None).await;
    assert_eq!(stock["data"]["GB-010"], 3);

    let (_, check) = app
        .public(
            Method::POST,
            "/api/v1/discounts/validate",
            Some(json!({"code": code})),
        )
        .await;
    assert_eq!(check["valid"], false);

    let (_, status) = app
        .public(Method::GET, "/api/v1/payments/tr_test1", None)
        .await;
    assert_eq!(status["data"]["paid"], true);
    assert_eq!(status["data"]["orderNumber"], order_number.as_str());
}

#[tokio::test]
async fn webhook_marks_an_order_stored_at_checkout_as_paid() {
    let app = TestApp::new();

    let (status, _) = app
        .public(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "orderNumber": "GE-STORED1",
                "customerName": "Jan de Vries",
                "customerEmail": CUSTOMER_EMAIL,
                "items": [{"name": "Tetris", "sku": "GB-010", "quantity": 1, "price": 20}],
                "subtotal": 20,
                "shipping": 5,
                "total": 25,
                "straat": "Dorpsstraat",
                "huisnummer": "12",
                "postcode": "1234AB",
                "plaats": "Enter"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    app.paid_payment(
        "tr_paid1",
        json!({
            "orderNumber": "GE-STORED1",
            "customerEmail": CUSTOMER_EMAIL,
            "items": "[{\"name\":\"Tetris\",\"sku\":\"GB-010\",\"quantity\":1,\"price\":20}]",
            "shipping": "5.00"
        }),
        rust_decimal::Decimal::from(25),
    );
    app.webhook_form("tr_paid1").await;

    let (status, body) = app
        .admin(Method::GET, "/api/v1/admin/orders/GE-STORED1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paymentId"], "tr_paid1");
    assert_eq!(body["data"]["customerName"], "Jan de Vries");
    assert!(body["data"]["paidAt"].is_string());
}

#[tokio::test]
async fn storing_the_same_order_twice_keeps_the_first() {
    let app = TestApp::new();
    let order = json!({
        "orderNumber": "GE-TWICE",
        "customerName": "Jan de Vries",
        "customerEmail": CUSTOMER_EMAIL,
        "items": [{"name": "Tetris", "sku": "GB-010", "quantity": 1, "price": 20}],
        "subtotal": 20,
        "total": 20,
        "straat": "Dorpsstraat",
        "huisnummer": "12",
        "postcode": "1234AB",
        "plaats": "Enter"
    });

    let (first, _) = app
        .public(Method::POST, "/api/v1/orders", Some(order.clone()))
        .await;
    let (second, body) = app.public(Method::POST, "/api/v1/orders", Some(order)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["data"]["orderNumber"], "GE-TWICE");
}

#[tokio::test]
async fn shipment_stores_label_and_marks_order_shipped() {
    let app = TestApp::new();
    app.public(
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "orderNumber": "GE-SHIP1",
            "customerName": "Jan de Vries",
            "customerEmail": CUSTOMER_EMAIL,
            "items": [{"name": "Tetris", "sku": "GB-010", "quantity": 1, "price": 20}],
            "subtotal": 20,
            "total": 20,
            "straat": "Dorpsstraat",
            "huisnummer": "12",
            "postcode": "1234AB",
            "plaats": "Enter"
        })),
    )
    .await;

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/v1/admin/shipments",
            Some(json!({
                "orderNumber": "GE-SHIP1",
                "customer": {
                    "voornaam": "Jan",
                    "achternaam": "de Vries",
                    "email": CUSTOMER_EMAIL,
                    "straat": "Dorpsstraat",
                    "huisnummer": "12",
                    "postcode": "1234 ab",
                    "plaats": "Enter"
                },
                "items": [{"quantity": 1, "weight": 300}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["trackingCode"], "3STEST123");

    let (_, order) = app
        .admin(Method::GET, "/api/v1/admin/orders/GE-SHIP1", None)
        .await;
    assert_eq!(order["data"]["status"], "shipped");
    assert_eq!(order["data"]["trackingCode"], "3STEST123");

    // Tracking notice for the customer
    assert_eq!(app.email.sent_to(CUSTOMER_EMAIL), 1);

    let response = app
        .send(
            Method::GET,
            "/api/v1/admin/labels/GE-SHIP1",
            None,
            Body::empty(),
            Some(ADMIN_TOKEN),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], LABEL_PDF);

    let (status, tracking) = app
        .admin(Method::GET, "/api/v1/admin/shipments/GE-SHIP1/tracking", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["data"]["status"], "Bezorgd");
}

#[tokio::test]
async fn label_for_unknown_order_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app
        .admin(Method::GET, "/api/v1/admin/labels/GE-NOPE", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_email_waits_in_the_outbox_until_delivered() {
    let app = TestApp::new();
    app.email.set_failing(true);

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/v1/admin/email/send",
            Some(json!({
                "to": "klant@example.nl",
                "subject": "Je bestelling",
                "html": "<p>Hallo</p>"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "queued");
    let queue_id = body["data"]["messageId"].as_str().unwrap().to_string();

    let (_, overview) = app
        .admin(Method::GET, "/api/v1/admin/email/outbox", None)
        .await;
    assert_eq!(overview["data"]["stats"]["pending"], 1);
    assert_eq!(overview["data"]["items"][0]["id"], queue_id.as_str());
    assert_eq!(overview["data"]["items"][0]["attempts"], 1);

    let (status, record) = app
        .admin(
            Method::GET,
            &format!("/api/v1/admin/email/status?messageId={}", queue_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["data"]["status"], "pending");

    // Not due yet: the first retry waits a minute
    let report = outbox::drain_once(&app.state.services.notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);

    app.email.set_failing(false);
    let report = outbox::drain_once(
        &app.state.services.notifications,
        Utc::now() + Duration::minutes(2),
    )
    .await
    .unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(app.email.sent_to("klant@example.nl"), 1);

    let (_, overview) = app
        .admin(Method::GET, "/api/v1/admin/email/outbox", None)
        .await;
    assert_eq!(overview["data"]["stats"]["pending"], 0);
    assert_eq!(overview["data"]["stats"]["sent"], 1);
}

#[tokio::test]
async fn retrying_an_unknown_outbox_entry_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app
        .admin(Method::POST, "/api/v1/admin/email/outbox/email-nope/retry", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
