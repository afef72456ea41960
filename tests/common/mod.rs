#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rust_decimal::Decimal;
use serde_json::Value;
use gameshop_api::{
    config::AppConfig,
    models::EmailMessage,
    services::{
        carrier::{CarrierClient, CarrierError, Recipient, ShipmentLabel, TrackingStatus},
        email::{EmailError, EmailProvider},
        factory::ServiceFactory,
        payments::{Amount, GatewayError, NewPayment, Payment, PaymentGateway, PaymentStatus},
    },
    store::{DocumentStore, InMemoryDocumentStore},
    AppState,
};
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token-123456";
pub const LABEL_PDF: &[u8] = b"%PDF-1.4 test label";

/// Gateway double: payments live in memory and tests flip their status.
#[derive(Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, Payment>>,
    counter: AtomicUsize,
}

impl FakeGateway {
    pub fn insert(&self, payment: Payment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.clone(), payment);
    }

    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        if let Some(payment) = self.payments.lock().unwrap().get_mut(payment_id) {
            payment.status = status;
        }
    }

    pub fn created(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("tr_test{}", n);
        let created = Payment {
            id: id.clone(),
            status: PaymentStatus::Open,
            amount: payment.amount,
            description: payment.description,
            metadata: payment.metadata,
            checkout_url: Some(format!("https://pay.example/{}", id)),
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(payment_id.to_string()))
    }
}

/// Carrier double that always hands out the same label.
#[derive(Default)]
pub struct FakeCarrier {
    pub shipments: AtomicUsize,
}

#[async_trait]
impl CarrierClient for FakeCarrier {
    async fn create_shipment(
        &self,
        recipient: &Recipient,
        _order_number: &str,
        _weight_grams: u32,
    ) -> Result<ShipmentLabel, CarrierError> {
        self.shipments.fetch_add(1, Ordering::SeqCst);
        Ok(ShipmentLabel {
            tracking_code: "3STEST123".to_string(),
            tracking_url: format!(
                "https://jouw.postnl.nl/track-and-trace/3STEST123-NL-{}",
                recipient.postcode
            ),
            label_pdf: STANDARD.encode(LABEL_PDF),
        })
    }

    async fn tracking_status(
        &self,
        _tracking_code: &str,
        _postcode: &str,
    ) -> Result<TrackingStatus, CarrierError> {
        Ok(TrackingStatus {
            status: "Bezorgd".to_string(),
            timestamp: "2024-01-02T10:00:00Z".to_string(),
            description: "Zending is bezorgd".to_string(),
        })
    }
}

/// Email double that records every message and can be switched to failing.
#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> usize {
        self.sent().iter().filter(|m| m.to == to).count()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailProvider for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::Provider {
                status: 503,
                message: "provider down".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}

/// Application wired with in-memory collaborators.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryDocumentStore>,
    pub gateway: Arc<FakeGateway>,
    pub carrier: Arc<FakeCarrier>,
    pub email: Arc<RecordingEmail>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let carrier = Arc::new(FakeCarrier::default());
        let email = Arc::new(RecordingEmail::default());

        let config = Arc::new(AppConfig::with_admin_token(ADMIN_TOKEN));
        let factory = ServiceFactory::new(
            config,
            store.clone() as Arc<dyn DocumentStore>,
            gateway.clone(),
            carrier.clone(),
            email.clone(),
        );
        let state = AppState::new(&factory);
        let router = gameshop_api::app_router(state.clone());

        Self {
            router,
            state,
            store,
            gateway,
            carrier,
            email,
        }
    }

    /// Send a request with an optional bearer token and return the raw response.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: Body,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// JSON request; returns the status and the parsed body (Null when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let (content_type, body) = match body {
            Some(json) => (
                Some("application/json"),
                Body::from(serde_json::to_vec(&json).expect("serialize request body")),
            ),
            None => (None, Body::empty()),
        };
        let response = self.send(method, uri, content_type, body, token).await;
        read_json(response).await
    }

    pub async fn public(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, None).await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, Some(ADMIN_TOKEN)).await
    }

    /// Posts a form-encoded webhook notification like the gateway does.
    pub async fn webhook_form(&self, payment_id: &str) -> (StatusCode, Value) {
        let response = self
            .send(
                Method::POST,
                "/api/v1/payments/webhook",
                Some("application/x-www-form-urlencoded"),
                Body::from(format!("id={}", payment_id)),
                None,
            )
            .await;
        read_json(response).await
    }

    /// Registers a paid payment whose metadata mirrors a checkout.
    pub fn paid_payment(&self, id: &str, metadata: Value, total: Decimal) {
        self.gateway.insert(Payment {
            id: id.to_string(),
            status: PaymentStatus::Paid,
            amount: Amount::eur(total),
            description: "Gameshop Enter bestelling".to_string(),
            metadata,
            checkout_url: None,
        });
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response body")
    };
    (status, value)
}
