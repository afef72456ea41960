use ::redis::{aio::ConnectionManager, Script};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{Bucket, DocumentStore, StoreError, Versioned};

// Each document is a hash {doc, ver}; a per-bucket set indexes its keys.

const SET_SCRIPT: &str = r#"
redis.call('HSET', KEYS[1], 'doc', ARGV[1])
local ver = redis.call('HINCRBY', KEYS[1], 'ver', 1)
redis.call('SADD', KEYS[2], ARGV[2])
return ver
"#;

const SET_IF_VERSION_SCRIPT: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], 'ver') or '0')
if current ~= tonumber(ARGV[1]) then
  return -1
end
redis.call('HSET', KEYS[1], 'doc', ARGV[2], 'ver', current + 1)
redis.call('SADD', KEYS[2], ARGV[3])
return current + 1
"#;

const SET_IF_ABSENT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'doc', ARGV[1], 'ver', 1)
redis.call('SADD', KEYS[2], ARGV[2])
return 1
"#;

/// Redis-backed store shared by every instance of the service.
#[derive(Clone)]
pub struct RedisDocumentStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisDocumentStore {
    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        let namespace = namespace.into();
        info!(namespace = %namespace, "connected to redis document store");
        Ok(Self { conn, namespace })
    }

    fn doc_key(&self, bucket: Bucket, key: &str) -> String {
        document_key(&self.namespace, bucket, key)
    }

    fn index_key(&self, bucket: Bucket) -> String {
        index_key(&self.namespace, bucket)
    }

    fn serialize(key: &str, value: &Value) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|err| StoreError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        })
    }

    fn parse(key: &str, raw: &str) -> Result<Value, StoreError> {
        serde_json::from_str(raw).map_err(|err| StoreError::Corrupt {
            key: key.to_string(),
            message: err.to_string(),
        })
    }
}

pub(crate) fn document_key(namespace: &str, bucket: Bucket, key: &str) -> String {
    format!("{}:{}:doc:{}", namespace, bucket.name(), key)
}

pub(crate) fn index_key(namespace: &str, bucket: Bucket) -> String {
    format!("{}:{}:keys", namespace, bucket.name())
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .get_versioned(bucket, key)
            .await?
            .map(|versioned| versioned.value))
    }

    async fn get_versioned(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        let mut conn = self.conn.clone();
        let (doc, version): (Option<String>, Option<u64>) = ::redis::cmd("HMGET")
            .arg(self.doc_key(bucket, key))
            .arg("doc")
            .arg("ver")
            .query_async(&mut conn)
            .await?;

        match doc {
            Some(raw) => Ok(Some(Versioned {
                value: Self::parse(key, &raw)?,
                version: version.unwrap_or(0),
            })),
            None => Ok(None),
        }
    }

    async fn set(&self, bucket: Bucket, key: &str, value: Value) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = Script::new(SET_SCRIPT)
            .key(self.doc_key(bucket, key))
            .key(self.index_key(bucket))
            .arg(Self::serialize(key, &value)?)
            .arg(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_version(
        &self,
        bucket: Bucket,
        key: &str,
        value: Value,
        expected: u64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let version: i64 = Script::new(SET_IF_VERSION_SCRIPT)
            .key(self.doc_key(bucket, key))
            .key(self.index_key(bucket))
            .arg(expected)
            .arg(Self::serialize(key, &value)?)
            .arg(key)
            .invoke_async(&mut conn)
            .await?;

        if version < 0 {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
            });
        }
        Ok(version as u64)
    }

    async fn set_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let created: i64 = Script::new(SET_IF_ABSENT_SCRIPT)
            .key(self.doc_key(bucket, key))
            .key(self.index_key(bucket))
            .arg(Self::serialize(key, &value)?)
            .arg(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(created == 1)
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let (removed, _): (i64, i64) = ::redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.doc_key(bucket, key))
            .cmd("SREM")
            .arg(self.index_key(bucket))
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn list(&self, bucket: Bucket) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = ::redis::cmd("SMEMBERS")
            .arg(self.index_key(bucket))
            .query_async(&mut conn)
            .await?;
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
