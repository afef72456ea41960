/*!
 * # Metrics Module
 *
 * Prometheus counters for the shop's business events, exposed in text format
 * at `/metrics`.
 */

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("gameshop".into()), None)
        .expect("registry can be created");
    static ref PAYMENTS_CREATED: IntCounter = IntCounter::new(
        "payments_created_total",
        "Total number of payments created at the gateway"
    )
    .expect("metric can be created");
    static ref ORDERS_STORED: IntCounterVec = IntCounterVec::new(
        Opts::new("orders_stored_total", "Orders persisted, by source"),
        &["source"]
    )
    .expect("metric can be created");
    static ref WEBHOOKS: IntCounterVec = IntCounterVec::new(
        Opts::new("payment_webhooks_total", "Payment webhook deliveries, by outcome"),
        &["outcome"]
    )
    .expect("metric can be created");
    static ref EMAILS: IntCounterVec = IntCounterVec::new(
        Opts::new("emails_total", "Email delivery attempts, by result"),
        &["result"]
    )
    .expect("metric can be created");
    static ref SHIPMENTS_CREATED: IntCounter = IntCounter::new(
        "shipments_created_total",
        "Total number of carrier labels created"
    )
    .expect("metric can be created");
    static ref STOCK_WRITES: IntCounterVec = IntCounterVec::new(
        Opts::new("stock_writes_total", "Stock document writes, by kind"),
        &["kind"]
    )
    .expect("metric can be created");
    static ref DISCOUNT_REDEMPTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("discount_redemptions_total", "Discount redemption attempts, by result"),
        &["result"]
    )
    .expect("metric can be created");
}

/// Registers every collector with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PAYMENTS_CREATED.clone()),
        Box::new(ORDERS_STORED.clone()),
        Box::new(WEBHOOKS.clone()),
        Box::new(EMAILS.clone()),
        Box::new(SHIPMENTS_CREATED.clone()),
        Box::new(STOCK_WRITES.clone()),
        Box::new(DISCOUNT_REDEMPTIONS.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => error!("failed to register metric: {}", e),
        }
    }
}

pub fn record_payment_created() {
    PAYMENTS_CREATED.inc();
}

pub fn record_order_stored(source: &str) {
    ORDERS_STORED.with_label_values(&[source]).inc();
}

pub fn record_webhook(outcome: &str) {
    WEBHOOKS.with_label_values(&[outcome]).inc();
}

pub fn record_email(result: &str) {
    EMAILS.with_label_values(&[result]).inc();
}

pub fn record_shipment_created() {
    SHIPMENTS_CREATED.inc();
}

pub fn record_stock_write(kind: &str) {
    STOCK_WRITES.with_label_values(&[kind]).inc();
}

pub fn record_discount_redemption(result: &str) {
    DISCOUNT_REDEMPTIONS.with_label_values(&[result]).inc();
}

pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_counters_are_rendered() {
        register_metrics();
        register_metrics();
        record_webhook("processed");
        record_email("sent");

        let body = render().unwrap();
        assert!(body.contains("gameshop_payment_webhooks_total"));
        assert!(body.contains("outcome=\"processed\""));
        assert!(body.contains("gameshop_emails_total"));
    }
}
