//! Payment gateway client (Mollie v2 REST API).

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::models::OrderItem;

pub const CURRENCY: &str = "EUR";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Mollie API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Mollie request failed: {0}")]
    Transport(String),

    #[error("Mollie response could not be read: {0}")]
    InvalidResponse(String),

    #[error("Betaling {0} niet gevonden")]
    NotFound(String),

    #[error("Betaalprovider niet geconfigureerd")]
    NotConfigured,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Amount {
    pub currency: String,
    /// Two decimals, e.g. "45.00"
    pub value: String,
}

impl Amount {
    pub fn eur(value: Decimal) -> Self {
        Self {
            currency: CURRENCY.to_string(),
            value: format!("{:.2}", value.round_dp(2)),
        }
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.value).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Open,
    Pending,
    Authorized,
    Paid,
    #[serde(alias = "cancelled")]
    Canceled,
    Expired,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub amount: Amount,
    pub description: String,
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub metadata: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, GatewayError>;
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError>;
}

/// Mollie ids look like `tr_WDqYK6vllg`; anything else never reaches the API.
pub fn is_valid_payment_id(payment_id: &str) -> bool {
    !payment_id.is_empty()
        && payment_id.len() <= 64
        && payment_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─── Metadata ───────────────────────────────────────────────

/// Order details carried through the gateway and read back by the webhook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentMetadata {
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub comments: Option<String>,
    pub items: Vec<OrderItem>,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub discount_code: Option<String>,
    pub payment_method: Option<String>,
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn amount_field(value: &Value, key: &str) -> Decimal {
    let parsed = match value.get(key) {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.filter(|d| !d.is_sign_negative()).unwrap_or(Decimal::ZERO)
}

fn items_field(value: &Value) -> Vec<OrderItem> {
    match value.get("items") {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|err| {
            warn!(error = %err, "unreadable items in payment metadata");
            Vec::new()
        }),
        Some(list @ Value::Array(_)) => serde_json::from_value(list.clone()).unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl PaymentMetadata {
    /// Never fails: missing or malformed fields fall back to empty values.
    pub fn from_value(value: &Value) -> Self {
        Self {
            order_number: text_field(value, "orderNumber"),
            customer_name: text_field(value, "customerName"),
            customer_email: text_field(value, "customerEmail"),
            street: text_field(value, "street"),
            house_number: text_field(value, "houseNumber"),
            postcode: text_field(value, "postcode"),
            city: text_field(value, "city"),
            comments: text_field(value, "comments"),
            items: items_field(value),
            shipping: amount_field(value, "shipping"),
            discount: amount_field(value, "discount"),
            discount_code: text_field(value, "discountCode"),
            payment_method: text_field(value, "paymentMethod"),
        }
    }

    /// Items travel as a JSON string; amounts as two-decimal strings.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        let mut put = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::String(v.clone()));
            }
        };
        put("orderNumber", &self.order_number);
        put("customerName", &self.customer_name);
        put("customerEmail", &self.customer_email);
        put("street", &self.street);
        put("houseNumber", &self.house_number);
        put("postcode", &self.postcode);
        put("city", &self.city);
        put("comments", &self.comments);
        put("discountCode", &self.discount_code);
        put("paymentMethod", &self.payment_method);

        let items = serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string());
        map.insert("items".to_string(), Value::String(items));
        map.insert(
            "shipping".to_string(),
            Value::String(format!("{:.2}", self.shipping)),
        );
        map.insert(
            "discount".to_string(),
            Value::String(format!("{:.2}", self.discount)),
        );
        Value::Object(map)
    }
}

// ─── Mollie client ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MollieLink {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct MollieLinks {
    #[serde(default)]
    checkout: Option<MollieLink>,
}

#[derive(Debug, Deserialize)]
struct MolliePayment {
    id: String,
    status: PaymentStatus,
    amount: Amount,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default, rename = "_links")]
    links: MollieLinks,
}

impl From<MolliePayment> for Payment {
    fn from(p: MolliePayment) -> Self {
        Payment {
            id: p.id,
            status: p.status,
            amount: p.amount,
            description: p.description,
            metadata: p.metadata,
            checkout_url: p.links.checkout.map(|link| link.href),
        }
    }
}

#[derive(Clone)]
pub struct MollieClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MollieClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn read_payment(response: reqwest::Response) -> Result<Payment, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let payment: MolliePayment = response.json().await?;
        Ok(payment.into())
    }
}

#[async_trait]
impl PaymentGateway for MollieClient {
    #[instrument(skip(self, payment), fields(amount = %payment.amount.value))]
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, GatewayError> {
        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payment)
            .send()
            .await?;
        let created = Self::read_payment(response).await?;
        info!(payment_id = %created.id, "payment created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        if !is_valid_payment_id(payment_id) {
            return Err(GatewayError::NotFound(payment_id.to_string()));
        }
        let response = self
            .client
            .get(format!("{}/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(payment_id.to_string()));
        }
        Self::read_payment(response).await
    }
}

/// Stand-in used when no API key is configured (development only).
///
/// Created payments point straight back at the redirect URL; lookups fail so
/// webhooks are acknowledged without side effects.
#[derive(Clone, Default)]
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, GatewayError> {
        let order_number = payment
            .metadata
            .get("orderNumber")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let separator = if payment.redirect_url.contains('?') { '&' } else { '?' };
        warn!(%order_number, "payment gateway not configured; returning fallback payment");
        Ok(Payment {
            id: format!("tr_offline{}", Utc::now().timestamp_millis()),
            status: PaymentStatus::Open,
            checkout_url: Some(format!(
                "{}{}fallback=true&orderId={}",
                payment.redirect_url, separator, order_number
            )),
            amount: payment.amount,
            description: payment.description,
            metadata: payment.metadata,
        })
    }

    async fn get_payment(&self, _payment_id: &str) -> Result<Payment, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
