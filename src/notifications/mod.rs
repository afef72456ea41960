//! Transactional email dispatch.
//!
//! A message is handed to the provider straight away. If that fails it is
//! written to the outbox and the background worker takes over; callers only
//! see an error when the outbox write itself fails.

pub mod outbox;
pub mod templates;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::models::{
    DeliveryStatus, EmailKind, EmailMessage, EmailStats, EmailStatusRecord, Order, QueuedEmail,
};
use crate::services::email::EmailProvider;
use crate::store::{get_doc, list_docs, put_doc, Bucket, DocumentStore, StoreError};
use crate::validation::AbandonedCartRequest;

/// What happened to a message handed to [`NotificationService::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    /// First attempt failed; the message sits in the outbox under `queue_id`.
    Queued {
        #[serde(rename = "messageId")]
        queue_id: String,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            DispatchOutcome::Sent { message_id } => message_id,
            DispatchOutcome::Queued { queue_id, .. } => queue_id,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }
}

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn EmailProvider>,
    owner_address: String,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn EmailProvider>,
        owner_address: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            owner_address: owner_address.into(),
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn provider(&self) -> &dyn EmailProvider {
        self.provider.as_ref()
    }

    #[instrument(skip(self, message), fields(kind = %kind, to = %message.to))]
    pub async fn dispatch(
        &self,
        kind: EmailKind,
        message: EmailMessage,
    ) -> Result<DispatchOutcome, StoreError> {
        let now = Utc::now();
        match self.provider.send(&message).await {
            Ok(message_id) => {
                crate::metrics::record_email("sent");
                self.record_status(&EmailStatusRecord {
                    message_id: message_id.clone(),
                    status: DeliveryStatus::Sent,
                    kind,
                    timestamp: now,
                    error: None,
                })
                .await;
                Ok(DispatchOutcome::Sent { message_id })
            }
            Err(err) => {
                warn!(error = %err, "email delivery failed; queueing for retry");
                crate::metrics::record_email("queued");
                let entry = QueuedEmail::after_failure(kind, message, err.to_string(), now);
                outbox::enqueue(self.store.as_ref(), &entry).await?;
                self.record_status(&EmailStatusRecord {
                    message_id: entry.id.clone(),
                    status: DeliveryStatus::Pending,
                    kind,
                    timestamp: now,
                    error: Some(err.to_string()),
                })
                .await;
                Ok(DispatchOutcome::Queued {
                    queue_id: entry.id,
                    error: err.to_string(),
                })
            }
        }
    }

    /// Status bookkeeping never fails the caller.
    pub async fn record_status(&self, record: &EmailStatusRecord) {
        if let Err(err) =
            put_doc(self.store.as_ref(), Bucket::EmailStatus, &record.message_id, record).await
        {
            error!(message_id = %record.message_id, error = %err, "failed to record email status");
        }
    }

    pub async fn email_status(
        &self,
        message_id: &str,
    ) -> Result<Option<EmailStatusRecord>, StoreError> {
        get_doc(self.store.as_ref(), Bucket::EmailStatus, message_id).await
    }

    pub async fn send_order_confirmation(
        &self,
        order: &Order,
    ) -> Result<Option<DispatchOutcome>, StoreError> {
        let Some(to) = order.customer_email.as_deref() else {
            info!(order_number = %order.order_number, "no customer email; confirmation skipped");
            return Ok(None);
        };
        let message = templates::order_confirmation(order, to);
        self.dispatch(EmailKind::OrderConfirmation, message)
            .await
            .map(Some)
    }

    pub async fn send_owner_notification(
        &self,
        order: &Order,
    ) -> Result<DispatchOutcome, StoreError> {
        let message = templates::owner_notification(order, &self.owner_address);
        self.dispatch(EmailKind::OwnerNotification, message).await
    }

    pub async fn send_tracking_notice(
        &self,
        to: &str,
        customer_name: &str,
        order_number: &str,
        tracking_code: &str,
        tracking_url: &str,
    ) -> Result<DispatchOutcome, StoreError> {
        let message = templates::tracking_notice(
            to,
            customer_name,
            order_number,
            tracking_code,
            tracking_url,
        );
        self.dispatch(EmailKind::Tracking, message).await
    }

    pub async fn send_welcome(
        &self,
        to: &str,
        discount_code: &str,
        percentage: u32,
    ) -> Result<DispatchOutcome, StoreError> {
        let message = templates::welcome(to, discount_code, percentage);
        self.dispatch(EmailKind::Welcome, message).await
    }

    pub async fn send_abandoned_cart(
        &self,
        cart: &AbandonedCartRequest,
    ) -> Result<DispatchOutcome, StoreError> {
        info!(reminder = %cart.reminder_type, items = cart.cart_items.len(), "abandoned cart reminder");
        self.dispatch(EmailKind::AbandonedCart, templates::abandoned_cart(cart))
            .await
    }

    /// Statistics over every stored delivery record.
    pub async fn email_stats(&self) -> Result<EmailStats, StoreError> {
        let records = list_docs::<EmailStatusRecord>(self.store.as_ref(), Bucket::EmailStatus)
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect();
        Ok(EmailStats::from_records(records, Utc::now()))
    }
}
