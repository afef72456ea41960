use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;

use super::{Bucket, DocumentStore, StoreError, Versioned};

#[derive(Clone, Debug)]
struct StoredDocument {
    value: Value,
    version: u64,
}

/// Process-local store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: DashMap<(Bucket, String), StoredDocument>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .docs
            .get(&(bucket, key.to_string()))
            .map(|doc| doc.value.clone()))
    }

    async fn get_versioned(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        Ok(self.docs.get(&(bucket, key.to_string())).map(|doc| Versioned {
            value: doc.value.clone(),
            version: doc.version,
        }))
    }

    async fn set(&self, bucket: Bucket, key: &str, value: Value) -> Result<(), StoreError> {
        match self.docs.entry((bucket, key.to_string())) {
            Entry::Occupied(mut occupied) => {
                let doc = occupied.get_mut();
                doc.value = value;
                doc.version += 1;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredDocument { value, version: 1 });
            }
        }
        Ok(())
    }

    async fn set_if_version(
        &self,
        bucket: Bucket,
        key: &str,
        value: Value,
        expected: u64,
    ) -> Result<u64, StoreError> {
        let conflict = || StoreError::VersionConflict {
            key: key.to_string(),
        };
        match self.docs.entry((bucket, key.to_string())) {
            Entry::Occupied(mut occupied) => {
                let doc = occupied.get_mut();
                if doc.version != expected {
                    return Err(conflict());
                }
                doc.value = value;
                doc.version += 1;
                Ok(doc.version)
            }
            Entry::Vacant(vacant) => {
                if expected != 0 {
                    return Err(conflict());
                }
                vacant.insert(StoredDocument { value, version: 1 });
                Ok(1)
            }
        }
    }

    async fn set_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        match self.docs.entry((bucket, key.to_string())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(StoredDocument { value, version: 1 });
                Ok(true)
            }
        }
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<bool, StoreError> {
        Ok(self.docs.remove(&(bucket, key.to_string())).is_some())
    }

    async fn list(&self, bucket: Bucket) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
