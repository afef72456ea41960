//! Request schemas and the extractor that enforces them.
//!
//! Every inbound body is deserialized and checked here before a handler sees
//! it. A failure never reaches the services: it becomes a 400 carrying one
//! `field: message` line per violated constraint.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::errors::ServiceError;
use crate::models::{ReminderType, StockAction, WishlistItem};

lazy_static! {
    pub static ref SKU_REGEX: Regex = Regex::new(r"^[A-Z0-9-]+$").unwrap();
    pub static ref POSTCODE_REGEX: Regex = Regex::new(r"^[0-9]{4}\s?[a-zA-Z]{2}$").unwrap();
}

pub const MAX_ITEM_QUANTITY: u64 = 10;

/// Flattens nested validator output into sorted `path: message` lines.
pub fn flatten_errors(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect_errors("", errors, &mut out);
    out.sort();
    out
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    out.push(format!("{}: {}", path, describe(err)));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

fn describe(err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }
    match err.code.as_ref() {
        "email" => "Ongeldig e-mailadres".to_string(),
        "length" => "Ongeldige lengte".to_string(),
        "range" => "Waarde buiten toegestaan bereik".to_string(),
        "regex" => "Ongeldig formaat".to_string(),
        "url" => "Ongeldige URL".to_string(),
        other => other.to_string(),
    }
}

fn error_with(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        Err(error_with("positive", "Bedrag moet groter dan 0 zijn"))
    }
}

fn validate_non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(error_with("non_negative", "Bedrag mag niet negatief zijn"))
    } else {
        Ok(())
    }
}

fn validate_sku_keys(map: &BTreeMap<String, i64>) -> Result<(), ValidationError> {
    if map.keys().all(|sku| SKU_REGEX.is_match(sku)) {
        Ok(())
    } else {
        Err(error_with("sku", "Ongeldige SKU"))
    }
}

fn validate_wishlist_items(items: &[WishlistItem]) -> Result<(), ValidationError> {
    if items.iter().all(|item| SKU_REGEX.is_match(&item.sku)) {
        Ok(())
    } else {
        Err(error_with("sku", "Ongeldige SKU"))
    }
}

/// JSON body extractor that also runs the body's `Validate` impl.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

// ─── Checkout ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CheckoutItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(range(min = 1, max = 10, message = "Aantal moet tussen 1 en 10 liggen"))]
    pub quantity: u32,
    #[validate(custom = "validate_positive_amount")]
    #[schema(value_type = f64)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    Ideal,
    Creditcard,
    Paypal,
    Bancontact,
    Applepay,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CheckoutCustomer {
    #[validate(length(min = 1, max = 100))]
    pub voornaam: String,
    #[validate(length(min = 1, max = 100))]
    pub achternaam: String,
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub straat: String,
    #[validate(length(min = 1, max = 20))]
    pub huisnummer: String,
    #[validate(regex(path = "POSTCODE_REGEX", message = "Ongeldige postcode"))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub plaats: String,
    #[serde(default)]
    pub betaalmethode: Option<PaymentMethod>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub opmerkingen: Option<String>,
}

impl CheckoutCustomer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.voornaam.trim(), self.achternaam.trim())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[validate]
    #[validate(length(min = 1, message = "Winkelwagen is leeg"))]
    pub items: Vec<CheckoutItem>,
    #[validate]
    pub customer: CheckoutCustomer,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub shipping: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub discount: Decimal,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub discount_code: Option<String>,
    #[validate(custom = "validate_positive_amount")]
    #[schema(value_type = f64)]
    pub total: Decimal,
}

// ─── Orders ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct StoreOrderItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[validate(range(min = 1, max = 10, message = "Aantal moet tussen 1 en 10 liggen"))]
    pub quantity: u32,
    #[validate(custom = "validate_positive_amount")]
    #[schema(value_type = f64)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreOrderRequest {
    #[validate(length(min = 1, max = 40))]
    pub order_number: String,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub customer_email: String,
    #[validate]
    #[validate(length(min = 1, message = "Bestelling bevat geen artikelen"))]
    pub items: Vec<StoreOrderItem>,
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub shipping: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub discount: Decimal,
    #[validate(custom = "validate_positive_amount")]
    #[schema(value_type = f64)]
    pub total: Decimal,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub discount_code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub straat: String,
    #[validate(length(min = 1, max = 20))]
    pub huisnummer: String,
    #[validate(regex(path = "POSTCODE_REGEX", message = "Ongeldige postcode"))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub plaats: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub opmerkingen: Option<String>,
    #[serde(default)]
    pub betaalmethode: Option<PaymentMethod>,
}

// ─── Newsletter & discounts ─────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewsletterSignup {
    #[validate(email(message = "Ongeldig e-mailadres"), length(max = 254))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct DiscountValidateRequest {
    #[validate(length(min = 1, max = 20, message = "Geen code opgegeven"))]
    pub code: String,
    /// When present the response includes the discount amount
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = Option<f64>)]
    pub subtotal: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRedeemRequest {
    #[validate(length(min = 1, max = 20, message = "Geen code opgegeven"))]
    pub code: String,
    #[validate(length(min = 1, max = 40))]
    pub order_number: String,
}

// ─── Stock ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct StockUpdateRequest {
    #[validate(regex(path = "SKU_REGEX", message = "Ongeldige SKU"))]
    pub sku: String,
    #[serde(default)]
    pub action: Option<StockAction>,
    /// Absolute count; negative values are stored as 0
    #[serde(default)]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockBulkRequest {
    #[validate(custom = "validate_sku_keys")]
    pub stock_updates: BTreeMap<String, i64>,
}

// ─── Shipments ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ShipmentCustomer {
    #[validate(length(min = 1, max = 100))]
    pub voornaam: String,
    #[validate(length(min = 1, max = 100))]
    pub achternaam: String,
    #[serde(default)]
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub straat: String,
    #[validate(length(min = 1, max = 20))]
    pub huisnummer: String,
    #[validate(length(min = 4, max = 10))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub plaats: String,
}

impl ShipmentCustomer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.voornaam.trim(), self.achternaam.trim())
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ShipmentItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub price: Decimal,
    /// Grams per unit
    #[serde(default)]
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    #[validate(length(min = 1, max = 40))]
    pub order_number: String,
    #[validate]
    pub customer: ShipmentCustomer,
    #[serde(default)]
    #[validate]
    pub items: Vec<ShipmentItem>,
}

// ─── Reviews & wishlist ─────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ReviewSubmission {
    #[validate(regex(path = "SKU_REGEX", message = "Ongeldige SKU"))]
    pub sku: String,
    #[validate(range(min = 1, max = 5, message = "Beoordeling moet tussen 1 en 5 liggen"))]
    pub rating: u8,
    #[validate(length(min = 3, max = 100))]
    pub title: String,
    #[validate(length(min = 10, max = 1000))]
    pub comment: String,
    #[validate(length(min = 2, max = 50))]
    pub author: String,
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistSyncRequest {
    #[validate(custom = "validate_wishlist_items")]
    pub items: Vec<WishlistItem>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub user_id: Option<String>,
}

// ─── Email ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub to: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AbandonedCartItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, message = "Aantal moet minimaal 1 zijn"))]
    pub quantity: u32,
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCartRequest {
    #[validate(email(message = "Ongeldig e-mailadres"))]
    pub customer_email: String,
    #[validate(length(min = 1, max = 200, message = "Naam is verplicht"))]
    pub customer_name: String,
    #[validate]
    #[validate(length(min = 1, message = "Winkelwagen is leeg"))]
    pub cart_items: Vec<AbandonedCartItem>,
    #[validate(custom = "validate_non_negative_amount")]
    #[schema(value_type = f64)]
    pub cart_total: Decimal,
    #[validate(url(message = "Ongeldige winkelwagen-URL"))]
    pub cart_url: String,
    #[serde(default)]
    pub reminder_type: ReminderType,
}
