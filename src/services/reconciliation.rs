//! Turns a paid payment notification into a stored order and its side effects.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::models::order::{generate_order_number, subtotal_of};
use crate::models::{Order, OrderStatus, ShippingAddress};
use crate::notifications::NotificationService;
use crate::services::discounts::DiscountService;
use crate::services::orders::OrderService;
use crate::services::payments::{Payment, PaymentGateway, PaymentMetadata};
use crate::services::stock::StockService;
use crate::store::{create_doc, Bucket, DocumentStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment could not be fetched; nothing was done.
    GatewayUnavailable,
    NotPaid(String),
    /// Another delivery already claimed this payment.
    Duplicate,
    Processed { order_number: String },
    /// The order could not be persisted; the claim was released.
    Failed,
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::GatewayUnavailable => "gateway_unavailable",
            WebhookOutcome::NotPaid(_) => "not_paid",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Processed { .. } => "processed",
            WebhookOutcome::Failed => "failed",
        }
    }
}

pub fn claim_key(payment_id: &str) -> String {
    format!("payment:{}", payment_id)
}

/// Order reconstructed from what checkout put in the payment metadata.
pub fn order_from_payment(payment: &Payment, metadata: &PaymentMetadata) -> Order {
    let now = Utc::now();
    let subtotal = subtotal_of(&metadata.items);
    let total = payment
        .amount
        .to_decimal()
        .unwrap_or(subtotal + metadata.shipping - metadata.discount);

    Order {
        order_number: metadata
            .order_number
            .clone()
            .unwrap_or_else(|| generate_order_number(now)),
        customer_name: metadata.customer_name.clone().unwrap_or_default(),
        customer_email: metadata.customer_email.clone(),
        items: metadata.items.clone(),
        subtotal,
        shipping: metadata.shipping,
        discount: metadata.discount,
        total,
        discount_code: metadata.discount_code.clone(),
        address: ShippingAddress {
            street: metadata.street.clone().unwrap_or_default(),
            house_number: metadata.house_number.clone().unwrap_or_default(),
            postcode: metadata.postcode.clone().unwrap_or_default(),
            city: metadata.city.clone().unwrap_or_default(),
        },
        payment_method: metadata.payment_method.clone(),
        comments: metadata.comments.clone(),
        status: OrderStatus::Processing,
        created_at: now,
        tracking_code: None,
        tracking_url: None,
        label_reference: None,
        shipped_at: None,
        payment_id: None,
        paid_at: None,
    }
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PaymentGateway>,
    orders: OrderService,
    discounts: DiscountService,
    stock: StockService,
    notifications: Arc<NotificationService>,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        orders: OrderService,
        discounts: DiscountService,
        stock: StockService,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            gateway,
            orders,
            discounts,
            stock,
            notifications,
        }
    }

    /// Handles one gateway notification. Never fails: every problem is logged
    /// and reported through the outcome so the gateway always gets its ack.
    #[instrument(skip(self))]
    pub async fn handle_notification(&self, payment_id: &str) -> WebhookOutcome {
        let outcome = self.process(payment_id).await;
        crate::metrics::record_webhook(outcome.label());
        outcome
    }

    async fn process(&self, payment_id: &str) -> WebhookOutcome {
        let payment = match self.gateway.get_payment(payment_id).await {
            Ok(payment) => payment,
            Err(err) => {
                error!(error = %err, "could not fetch payment for webhook");
                return WebhookOutcome::GatewayUnavailable;
            }
        };

        if !payment.status.is_paid() {
            info!(status = %payment.status, "payment not paid; nothing to do");
            return WebhookOutcome::NotPaid(payment.status.to_string());
        }

        let claim = json!({"paymentId": payment_id, "claimedAt": Utc::now()});
        match create_doc(
            self.store.as_ref(),
            Bucket::ProcessedPayments,
            &claim_key(payment_id),
            &claim,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("payment already processed; duplicate delivery ignored");
                return WebhookOutcome::Duplicate;
            }
            Err(err) => {
                error!(error = %err, "could not claim payment");
                return WebhookOutcome::Failed;
            }
        }

        let metadata = PaymentMetadata::from_value(&payment.metadata);
        let fallback = order_from_payment(&payment, &metadata);
        let order = match self.orders.upsert_paid(fallback, payment_id).await {
            Ok(order) => order,
            Err(err) => {
                error!(error = %err, "could not persist paid order; releasing claim");
                if let Err(err) = self
                    .store
                    .delete(Bucket::ProcessedPayments, &claim_key(payment_id))
                    .await
                {
                    error!(error = %err, "could not release payment claim");
                }
                return WebhookOutcome::Failed;
            }
        };

        self.after_payment(&order, &metadata).await;
        info!(order_number = %order.order_number, "paid order reconciled");
        WebhookOutcome::Processed {
            order_number: order.order_number,
        }
    }

    /// Best-effort follow-ups; a failure here never undoes the order.
    /// The payment metadata decides the recipient and the discount code,
    /// the stored order only fills in what the metadata lacks.
    async fn after_payment(&self, order: &Order, metadata: &PaymentMetadata) {
        let mut notice = order.clone();
        if metadata.customer_email.is_some() {
            notice.customer_email = metadata.customer_email.clone();
        }

        if let Err(err) = self.notifications.send_order_confirmation(&notice).await {
            error!(error = %err, "order confirmation email could not be sent or queued");
        }
        if let Err(err) = self.notifications.send_owner_notification(&notice).await {
            error!(error = %err, "owner notification could not be sent or queued");
        }

        let code = metadata
            .discount_code
            .as_deref()
            .or(order.discount_code.as_deref());
        if let Some(code) = code {
            if let Err(err) = self.discounts.redeem(code, &order.order_number).await {
                warn!(error = %err, code, "discount redemption failed");
            }
        }

        if let Err(err) = self.stock.take_for_order(&order.items).await {
            warn!(error = %err, "stock decrement failed");
        }
    }
}
