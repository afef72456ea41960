use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::models::{Wishlist, WishlistItem};
use crate::store::{get_doc, put_doc, Bucket, DocumentStore};

#[derive(Clone)]
pub struct WishlistService {
    store: Arc<dyn DocumentStore>,
}

impl WishlistService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Replaces the stored wishlist for `user_id`. Anonymous syncs are only
    /// counted; there is nothing to key them by.
    pub async fn sync(
        &self,
        user_id: Option<&str>,
        items: Vec<WishlistItem>,
    ) -> Result<Wishlist, ServiceError> {
        let wishlist = Wishlist::new(
            user_id.unwrap_or_default().to_string(),
            items,
            Utc::now(),
        );

        match user_id {
            Some(user_id) => {
                put_doc(self.store.as_ref(), Bucket::Wishlists, user_id, &wishlist).await?;
                info!(user_id, items = wishlist.items.len(), "wishlist saved");
            }
            None => debug!(items = wishlist.items.len(), "anonymous wishlist sync"),
        }
        Ok(wishlist)
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Wishlist>, ServiceError> {
        Ok(get_doc(self.store.as_ref(), Bucket::Wishlists, user_id).await?)
    }
}
