use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::notifications::NotificationService;
use crate::services::carrier::{CarrierClient, Recipient, TrackingStatus};
use crate::services::orders::OrderService;
use crate::store::{get_doc, put_doc, Bucket, DocumentStore};
use crate::validation::{CreateShipmentRequest, ShipmentItem};

/// Assumed weight of one unit without a declared weight.
pub const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 100;
/// Lightest parcel the carrier accepts.
pub const MIN_PARCEL_WEIGHT_GRAMS: u32 = 100;

pub fn parcel_weight(items: &[ShipmentItem]) -> u32 {
    let total: u32 = items
        .iter()
        .map(|item| {
            item.weight
                .unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS)
                .saturating_mul(item.quantity)
        })
        .fold(0u32, |acc, w| acc.saturating_add(w));
    total.max(MIN_PARCEL_WEIGHT_GRAMS)
}

pub fn label_reference(order_number: &str) -> String {
    format!("{}-label.pdf", order_number)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentResult {
    pub tracking_code: String,
    pub tracking_url: String,
    pub label_reference: String,
    pub weight_grams: u32,
}

/// Label document as kept in the labels bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLabel {
    pub order_number: String,
    pub tracking_code: String,
    pub content_type: String,
    /// Base64 encoded PDF
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn DocumentStore>,
    carrier: Arc<dyn CarrierClient>,
    orders: OrderService,
    notifications: Arc<NotificationService>,
}

impl ShipmentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        carrier: Arc<dyn CarrierClient>,
        orders: OrderService,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            carrier,
            orders,
            notifications,
        }
    }

    /// Requests a label, stores it, marks the order shipped and emails the
    /// tracking notice. Carrier failures are returned as-is without retry.
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    pub async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<ShipmentResult, ServiceError> {
        let order_number = request.order_number.trim();
        if let Some(order) = self.orders.find(order_number).await? {
            if !order.status.can_ship() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Bestelling {} is {} en kan niet verzonden worden",
                    order_number, order.status
                )));
            }
        }

        let customer = &request.customer;
        let recipient = Recipient {
            name: customer.full_name(),
            street: customer.straat.trim().to_string(),
            house_number: customer.huisnummer.trim().to_string(),
            postcode: customer.postcode.replace(' ', "").to_uppercase(),
            city: customer.plaats.trim().to_string(),
        };
        let weight = parcel_weight(&request.items);

        let label = self
            .carrier
            .create_shipment(&recipient, order_number, weight)
            .await?;
        let reference = label_reference(order_number);

        let stored = StoredLabel {
            order_number: order_number.to_string(),
            tracking_code: label.tracking_code.clone(),
            content_type: "application/pdf".to_string(),
            content: label.label_pdf.clone(),
            created_at: Utc::now(),
        };
        put_doc(self.store.as_ref(), Bucket::Labels, &reference, &stored).await?;

        let shipped = self
            .orders
            .modify(order_number, |order| {
                order.mark_shipped(
                    label.tracking_code.clone(),
                    label.tracking_url.clone(),
                    reference.clone(),
                    Utc::now(),
                );
                Ok(())
            })
            .await?;
        if shipped.is_none() {
            warn!("shipment created for an order that is not stored");
        }

        if let Some(email) = customer.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if let Err(err) = self
                .notifications
                .send_tracking_notice(
                    email,
                    &recipient.name,
                    order_number,
                    &label.tracking_code,
                    &label.tracking_url,
                )
                .await
            {
                error!(error = %err, "tracking email could not be sent or queued");
            }
        }

        crate::metrics::record_shipment_created();
        info!(tracking_code = %label.tracking_code, weight, "shipment created");
        Ok(ShipmentResult {
            tracking_code: label.tracking_code,
            tracking_url: label.tracking_url,
            label_reference: reference,
            weight_grams: weight,
        })
    }

    /// Decoded PDF for a stored label.
    pub async fn label_pdf(&self, order_number: &str) -> Result<Vec<u8>, ServiceError> {
        let reference = label_reference(order_number);
        let label: StoredLabel = get_doc(self.store.as_ref(), Bucket::Labels, &reference)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Label {} niet gevonden", reference)))?;
        STANDARD
            .decode(label.content.as_bytes())
            .map_err(|err| ServiceError::InternalError(format!("label {}: {}", reference, err)))
    }

    /// Live carrier status for a shipped order.
    pub async fn tracking(&self, order_number: &str) -> Result<TrackingStatus, ServiceError> {
        let order = self.orders.get(order_number).await?;
        let Some(code) = order.tracking_code.as_deref() else {
            return Err(ServiceError::InvalidOperation(format!(
                "Bestelling {} is nog niet verzonden",
                order_number
            )));
        };
        let postcode = order.address.postcode.replace(' ', "");
        Ok(self.carrier.tracking_status(code, &postcode).await?)
    }
}
