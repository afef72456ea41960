use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::models::stock::STOCK_KEY;
use crate::models::{OrderItem, StockAction, StockLevels};
use crate::store::{get_doc, update_doc, Bucket, DocumentStore};

/// Service for the per-SKU stock counters.
///
/// All counters live in one document; every write goes through a
/// version-checked update so concurrent admin edits and webhook decrements
/// never overwrite each other.
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn DocumentStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Full stock map. A store failure reads as an empty map (everything available).
    #[instrument(skip(self))]
    pub async fn levels(&self) -> BTreeMap<String, i64> {
        match get_doc::<StockLevels>(self.store.as_ref(), Bucket::Stock, STOCK_KEY).await {
            Ok(levels) => levels.unwrap_or_default().into_map(),
            Err(err) => {
                warn!(error = %err, "stock read failed; reporting empty stock");
                BTreeMap::new()
            }
        }
    }

    /// Applies an increment/decrement, or an absolute count when no action is
    /// given, and returns the stored count.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        sku: &str,
        action: Option<StockAction>,
        count: Option<i64>,
    ) -> Result<i64, ServiceError> {
        if action.is_none() && count.is_none() {
            return Err(ServiceError::ValidationError(
                "Geef een actie of een voorraadaantal op".to_string(),
            ));
        }

        let stored = update_doc::<StockLevels, _, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Stock,
            STOCK_KEY,
            |levels| {
                Ok(match (action, count) {
                    (Some(action), _) => levels.apply(sku, action),
                    (None, Some(count)) => levels.set(sku, count),
                    (None, None) => levels.current(sku),
                })
            },
        )
        .await?;

        crate::metrics::record_stock_write("single");
        info!(sku, stock = stored, "stock updated");
        Ok(stored)
    }

    /// Sets absolute counts for many SKUs in one write. Returns how many were written.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn bulk_set(&self, updates: &BTreeMap<String, i64>) -> Result<usize, ServiceError> {
        let written = update_doc::<StockLevels, _, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Stock,
            STOCK_KEY,
            |levels| {
                for (sku, count) in updates {
                    levels.set(sku, *count);
                }
                Ok(updates.len())
            },
        )
        .await?;

        crate::metrics::record_stock_write("bulk");
        info!(written, "stock bulk update applied");
        Ok(written)
    }

    /// Takes each paid line item out of stock, floored at zero.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn take_for_order(&self, items: &[OrderItem]) -> Result<(), ServiceError> {
        let lines: Vec<&OrderItem> = items.iter().filter(|item| !item.sku.is_empty()).collect();
        if lines.is_empty() {
            return Ok(());
        }

        update_doc::<StockLevels, _, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Stock,
            STOCK_KEY,
            |levels| {
                for item in &lines {
                    levels.take(&item.sku, item.quantity);
                }
                Ok(())
            },
        )
        .await?;

        crate::metrics::record_stock_write("order");
        Ok(())
    }
}
