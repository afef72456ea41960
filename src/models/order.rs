use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Largest accepted gap between the declared total and the recomputed one.
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Enum representing the possible statuses of an order.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// A label may be (re)created while the parcel has not been delivered or cancelled.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Shipped)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    #[serde(default)]
    pub sku: String,
    pub quantity: u32,
    #[schema(value_type = f64)]
    pub price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub house_number: String,
    pub postcode: String,
    pub city: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub items: Vec<OrderItem>,
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
    #[schema(value_type = f64)]
    pub shipping: Decimal,
    #[schema(value_type = f64)]
    pub discount: Decimal,
    #[schema(value_type = f64)]
    pub total: Decimal,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub address: ShippingAddress,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub label_reference: Option<String>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn mark_paid(&mut self, payment_id: &str, at: DateTime<Utc>) {
        self.payment_id = Some(payment_id.to_string());
        if self.paid_at.is_none() {
            self.paid_at = Some(at);
        }
    }

    pub fn mark_shipped(
        &mut self,
        tracking_code: String,
        tracking_url: String,
        label_reference: String,
        at: DateTime<Utc>,
    ) {
        self.status = OrderStatus::Shipped;
        self.tracking_code = Some(tracking_code);
        self.tracking_url = Some(tracking_url);
        self.label_reference = Some(label_reference);
        self.shipped_at = Some(at);
    }
}

pub fn subtotal_of(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

/// Checks `total = subtotal + shipping - discount` within one cent.
pub fn check_total(
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
    total: Decimal,
) -> Result<(), String> {
    let expected = subtotal + shipping - discount;
    if (expected - total).abs() > TOTAL_TOLERANCE {
        return Err(format!(
            "Totaalbedrag klopt niet: verwacht {:.2}, ontvangen {:.2}",
            expected, total
        ));
    }
    Ok(())
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `GE-` followed by the base36 millisecond timestamp and two random characters.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..2)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("GE-{}{}", to_base36(millis), suffix)
}
