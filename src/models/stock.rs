use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Count assumed for a SKU that has never been written.
pub const DEFAULT_STOCK: i64 = 1;

/// Key of the single document holding every counter.
pub const STOCK_KEY: &str = "stock";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockAction {
    Increment,
    Decrement,
}

/// SKU to non-negative count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct StockLevels(BTreeMap<String, i64>);

impl StockLevels {
    pub fn current(&self, sku: &str) -> i64 {
        self.0.get(sku).copied().unwrap_or(DEFAULT_STOCK)
    }

    pub fn apply(&mut self, sku: &str, action: StockAction) -> i64 {
        let current = self.current(sku);
        let next = match action {
            StockAction::Increment => current.saturating_add(1),
            StockAction::Decrement => current - 1,
        };
        self.set(sku, next)
    }

    /// Removes `quantity` units, floored at zero.
    pub fn take(&mut self, sku: &str, quantity: u32) -> i64 {
        let next = self.current(sku) - i64::from(quantity);
        self.set(sku, next)
    }

    /// Stores `count` clamped to zero and returns the stored value.
    pub fn set(&mut self, sku: &str, count: i64) -> i64 {
        let count = count.max(0);
        self.0.insert(sku.to_string(), count);
        count
    }

    pub fn as_map(&self) -> &BTreeMap<String, i64> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, i64> {
        self.0
    }
}
