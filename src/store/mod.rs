//! Key-value document store.
//!
//! Every persisted entity lives in a named bucket as a JSON document under a
//! string key. Plain `set` is last-write-wins; read-modify-write callers go
//! through [`DocumentStore::set_if_version`] so a concurrent writer cannot be
//! silently overwritten, and one-shot claims use [`DocumentStore::set_if_absent`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryDocumentStore;
pub use self::redis::RedisDocumentStore;

/// Attempts made by [`update_doc`] before giving up on a contended key.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stale write rejected for key {key}")]
    VersionConflict { key: String },

    #[error("corrupt document {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Orders,
    Stock,
    Discounts,
    Labels,
    Reviews,
    Wishlists,
    EmailOutbox,
    EmailStatus,
    ProcessedPayments,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Orders => "gameshop-orders",
            Bucket::Stock => "gameshop-stock",
            Bucket::Discounts => "gameshop-discounts",
            Bucket::Labels => "gameshop-labels",
            Bucket::Reviews => "gameshop-reviews",
            Bucket::Wishlists => "gameshop-wishlists",
            Bucket::EmailOutbox => "gameshop-email-outbox",
            Bucket::EmailStatus => "gameshop-email-status",
            Bucket::ProcessedPayments => "gameshop-processed-payments",
        }
    }
}

/// A document together with the version it was read at.
///
/// Versions start at 1 for the first write; 0 means "absent".
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Value>, StoreError>;

    async fn get_versioned(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError>;

    /// Unconditional write.
    async fn set(&self, bucket: Bucket, key: &str, value: Value) -> Result<(), StoreError>;

    /// Writes only if the stored version still equals `expected` and returns
    /// the new version. Use `expected = 0` to create a document.
    async fn set_if_version(
        &self,
        bucket: Bucket,
        key: &str,
        value: Value,
        expected: u64,
    ) -> Result<u64, StoreError>;

    /// Writes only if the key does not exist. Returns whether this call won.
    async fn set_if_absent(&self, bucket: Bucket, key: &str, value: Value)
        -> Result<bool, StoreError>;

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<bool, StoreError>;

    /// Keys in the bucket, sorted.
    async fn list(&self, bucket: Bucket) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|err| StoreError::Corrupt {
        key: key.to_string(),
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Corrupt {
        key: key.to_string(),
        message: err.to_string(),
    })
}

pub async fn get_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    bucket: Bucket,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(bucket, key).await? {
        Some(value) => decode(key, value).map(Some),
        None => Ok(None),
    }
}

pub async fn put_doc<T: Serialize>(
    store: &dyn DocumentStore,
    bucket: Bucket,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = encode(key, value)?;
    store.set(bucket, key, value).await
}

pub async fn create_doc<T: Serialize>(
    store: &dyn DocumentStore,
    bucket: Bucket,
    key: &str,
    value: &T,
) -> Result<bool, StoreError> {
    let value = encode(key, value)?;
    store.set_if_absent(bucket, key, value).await
}

/// Loads every document in a bucket, skipping keys that vanish mid-scan.
pub async fn list_docs<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    bucket: Bucket,
) -> Result<Vec<(String, T)>, StoreError> {
    let mut docs = Vec::new();
    for key in store.list(bucket).await? {
        if let Some(doc) = get_doc(store, bucket, &key).await? {
            docs.push((key, doc));
        }
    }
    Ok(docs)
}

/// Version-checked read-modify-write.
///
/// `apply` runs against the current document (or `T::default()` when absent)
/// and may run more than once if another writer gets in between; it must not
/// have side effects outside the document. Returning `Err` aborts without
/// writing.
pub async fn update_doc<T, R, E, F>(
    store: &dyn DocumentStore,
    bucket: Bucket,
    key: &str,
    mut apply: F,
) -> Result<R, E>
where
    T: DeserializeOwned + Serialize + Default + Send,
    R: Send,
    E: From<StoreError> + Send,
    F: FnMut(&mut T) -> Result<R, E> + Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let (mut doc, version) = match store.get_versioned(bucket, key).await? {
            Some(current) => (decode::<T>(key, current.value)?, current.version),
            None => (T::default(), 0),
        };

        let outcome = apply(&mut doc)?;
        let value = encode(key, &doc)?;

        match store.set_if_version(bucket, key, value, version).await {
            Ok(_) => return Ok(outcome),
            Err(StoreError::VersionConflict { .. }) => {
                debug!(bucket = bucket.name(), key, attempt, "retrying stale write");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(StoreError::VersionConflict {
        key: key.to_string(),
    }
    .into())
}

/// Version-checked edit of a document that must already exist.
///
/// Returns `Ok(None)` without writing when the key is absent. `apply` follows
/// the same rules as in [`update_doc`].
pub async fn update_existing<T, E, F>(
    store: &dyn DocumentStore,
    bucket: Bucket,
    key: &str,
    mut apply: F,
) -> Result<Option<T>, E>
where
    T: DeserializeOwned + Serialize + Send,
    E: From<StoreError> + Send,
    F: FnMut(&mut T) -> Result<(), E> + Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let Some(current) = store.get_versioned(bucket, key).await? else {
            return Ok(None);
        };
        let mut doc = decode::<T>(key, current.value)?;
        apply(&mut doc)?;
        let value = encode(key, &doc)?;

        match store.set_if_version(bucket, key, value, current.version).await {
            Ok(_) => return Ok(Some(doc)),
            Err(StoreError::VersionConflict { .. }) => {
                debug!(bucket = bucket.name(), key, attempt, "retrying stale write");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(StoreError::VersionConflict {
        key: key.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        hits: u32,
    }

    #[tokio::test]
    async fn update_doc_starts_from_default() {
        let store = InMemoryDocumentStore::new();
        let hits = update_doc::<Counter, _, StoreError, _>(&store, Bucket::Stock, "c", |c| {
            c.hits += 1;
            Ok(c.hits)
        })
        .await
        .unwrap();
        assert_eq!(hits, 1);

        let stored: Counter = get_doc(&store, Bucket::Stock, "c").await.unwrap().unwrap();
        assert_eq!(stored, Counter { hits: 1 });
    }

    #[tokio::test]
    async fn update_doc_error_aborts_write() {
        let store = InMemoryDocumentStore::new();
        let result = update_doc::<Counter, (), StoreError, _>(&store, Bucket::Stock, "c", |_| {
            Err(StoreError::Backend("nope".into()))
        })
        .await;
        assert!(result.is_err());
        assert!(store.get(Bucket::Stock, "c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                update_doc::<BTreeMap<String, u32>, _, StoreError, _>(
                    store.as_ref(),
                    Bucket::Stock,
                    "map",
                    |map| {
                        map.insert(format!("k{}", i), i);
                        Ok(())
                    },
                )
                .await
            }));
        }
        for handle in handles {
            // Contention may exhaust retries; those callers see a conflict error.
            let _ = handle.await.unwrap();
        }

        let versioned = store.get_versioned(Bucket::Stock, "map").await.unwrap().unwrap();
        let map: BTreeMap<String, u32> = serde_json::from_value(versioned.value).unwrap();
        assert_eq!(map.len() as u64, versioned.version);
    }

    #[tokio::test]
    async fn update_existing_skips_absent_keys() {
        let store = InMemoryDocumentStore::new();
        let missing = update_existing::<Counter, StoreError, _>(&store, Bucket::Stock, "c", |c| {
            c.hits += 1;
            Ok(())
        })
        .await
        .unwrap();
        assert!(missing.is_none());
        assert!(store.get(Bucket::Stock, "c").await.unwrap().is_none());

        put_doc(&store, Bucket::Stock, "c", &Counter { hits: 4 }).await.unwrap();
        let updated = update_existing::<Counter, StoreError, _>(&store, Bucket::Stock, "c", |c| {
            c.hits += 1;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(updated, Some(Counter { hits: 5 }));
    }

    #[tokio::test]
    async fn corrupt_documents_are_reported() {
        let store = InMemoryDocumentStore::new();
        store
            .set(Bucket::Orders, "GE-1", serde_json::json!("not an object"))
            .await
            .unwrap();
        let result = get_doc::<Counter>(&store, Bucket::Orders, "GE-1").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
