use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub sku: String,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub user_id: String,
    pub items: Vec<WishlistItem>,
    pub updated_at: DateTime<Utc>,
}

impl Wishlist {
    /// Keeps the first occurrence of each SKU.
    pub fn new(user_id: String, items: Vec<WishlistItem>, now: DateTime<Utc>) -> Self {
        let mut unique: Vec<WishlistItem> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.iter().any(|existing| existing.sku == item.sku) {
                unique.push(item);
            }
        }
        Self {
            user_id,
            items: unique,
            updated_at: now,
        }
    }
}
