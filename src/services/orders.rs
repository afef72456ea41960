use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::errors::ServiceError;
use crate::models::order::{check_total, subtotal_of, TOTAL_TOLERANCE};
use crate::models::{Order, OrderItem, OrderStatus, ShippingAddress};
use crate::store::{
    create_doc, get_doc, list_docs, update_existing, Bucket, DocumentStore, StoreError,
    MAX_UPDATE_ATTEMPTS,
};
use crate::validation::StoreOrderRequest;

/// Whether a store call created the order or found it already there.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub order: Order,
    pub created: bool,
}

/// Builds an order from a checkout submission after checking its arithmetic.
pub fn order_from_request(req: &StoreOrderRequest) -> Result<Order, ServiceError> {
    let items: Vec<OrderItem> = req
        .items
        .iter()
        .map(|item| OrderItem {
            name: item.name.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    let computed = subtotal_of(&items);
    if (computed - req.subtotal).abs() > TOTAL_TOLERANCE {
        return Err(ServiceError::ValidationFailed(vec![format!(
            "subtotal: Subtotaal klopt niet: verwacht {:.2}, ontvangen {:.2}",
            computed, req.subtotal
        )]));
    }
    check_total(req.subtotal, req.shipping, req.discount, req.total)
        .map_err(|message| ServiceError::ValidationFailed(vec![format!("total: {}", message)]))?;

    Ok(Order {
        order_number: req.order_number.trim().to_string(),
        customer_name: req.customer_name.trim().to_string(),
        customer_email: Some(req.customer_email.trim().to_string()),
        items,
        subtotal: req.subtotal,
        shipping: req.shipping,
        discount: req.discount,
        total: req.total,
        discount_code: req
            .discount_code
            .as_deref()
            .map(crate::models::discount::normalize_code)
            .filter(|code| !code.is_empty()),
        address: ShippingAddress {
            street: req.straat.trim().to_string(),
            house_number: req.huisnummer.trim().to_string(),
            postcode: req.postcode.trim().to_uppercase(),
            city: req.plaats.trim().to_string(),
        },
        payment_method: req.betaalmethode.map(|m| m.to_string()),
        comments: req.opmerkingen.clone().filter(|c| !c.trim().is_empty()),
        status: OrderStatus::Processing,
        created_at: Utc::now(),
        tracking_code: None,
        tracking_url: None,
        label_reference: None,
        shipped_at: None,
        payment_id: None,
        paid_at: None,
    })
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn DocumentStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists a new order. Submitting the same order number twice leaves
    /// the first copy in place.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn create(&self, order: Order) -> Result<StoredOrder, ServiceError> {
        if create_doc(self.store.as_ref(), Bucket::Orders, &order.order_number, &order).await? {
            crate::metrics::record_order_stored("checkout");
            info!("order stored");
            return Ok(StoredOrder {
                order,
                created: true,
            });
        }

        debug!("order already stored");
        let existing = self.get(&order.order_number).await?;
        Ok(StoredOrder {
            order: existing,
            created: false,
        })
    }

    pub async fn find(&self, order_number: &str) -> Result<Option<Order>, ServiceError> {
        Ok(get_doc(self.store.as_ref(), Bucket::Orders, order_number).await?)
    }

    pub async fn get(&self, order_number: &str) -> Result<Order, ServiceError> {
        self.find(order_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bestelling {} niet gevonden", order_number)))
    }

    /// All orders, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = list_docs::<Order>(self.store.as_ref(), Bucket::Orders)
            .await?
            .into_iter()
            .map(|(_, order)| order)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Version-checked edit of a stored order. `Ok(None)` when the order does
    /// not exist.
    pub async fn modify<F>(&self, order_number: &str, apply: F) -> Result<Option<Order>, ServiceError>
    where
        F: FnMut(&mut Order) -> Result<(), ServiceError> + Send,
    {
        update_existing(self.store.as_ref(), Bucket::Orders, order_number, apply).await
    }

    /// Records the payment on an existing order, or creates the order from
    /// `fallback` when checkout never stored it. A stored order missing a
    /// customer email or discount code takes them from `fallback`.
    #[instrument(skip(self, fallback), fields(order_number = %fallback.order_number))]
    pub async fn upsert_paid(
        &self,
        fallback: Order,
        payment_id: &str,
    ) -> Result<Order, ServiceError> {
        let now = Utc::now();
        let order_number = fallback.order_number.clone();

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            if let Some(order) = self
                .modify(&order_number, |order| {
                    if order.customer_email.is_none() {
                        order.customer_email = fallback.customer_email.clone();
                    }
                    if order.discount_code.is_none() {
                        order.discount_code = fallback.discount_code.clone();
                    }
                    order.mark_paid(payment_id, now);
                    Ok(())
                })
                .await?
            {
                info!(payment_id, "existing order marked paid");
                return Ok(order);
            }

            let mut created = fallback.clone();
            created.mark_paid(payment_id, now);
            if create_doc(self.store.as_ref(), Bucket::Orders, &order_number, &created).await? {
                crate::metrics::record_order_stored("webhook");
                info!(payment_id, "order created from payment metadata");
                return Ok(created);
            }
            // Stored concurrently between the read and the create; mark that copy instead.
        }

        Err(StoreError::VersionConflict { key: order_number }.into())
    }
}
