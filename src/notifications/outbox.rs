//! Durable email outbox.
//!
//! Messages whose first delivery failed are stored in the email outbox bucket
//! and retried by a background worker on the 1/5/15 minute schedule of
//! [`QueuedEmail::record_failure`]. Each entry is leased with a version-checked
//! write before it is sent, so two workers never deliver the same entry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::models::{DeliveryStatus, EmailStatusRecord, QueuedEmail};
use crate::store::{get_doc, put_doc, Bucket, DocumentStore, StoreError};

use super::NotificationService;

/// How long a worker holds an entry while it is being delivered.
const LEASE_SECS: i64 = 60;
const DRAIN_BATCH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutboxStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub sent: usize,
    pub rescheduled: usize,
    pub failed: usize,
}

pub async fn enqueue(store: &dyn DocumentStore, entry: &QueuedEmail) -> Result<(), StoreError> {
    put_doc(store, Bucket::EmailOutbox, &entry.id, entry).await?;
    info!(id = %entry.id, kind = %entry.kind, to = %entry.message.to, "email queued for retry");
    Ok(())
}

pub async fn load_all(store: &dyn DocumentStore) -> Result<Vec<QueuedEmail>, StoreError> {
    let mut entries = Vec::new();
    for key in store.list(Bucket::EmailOutbox).await? {
        match get_doc::<QueuedEmail>(store, Bucket::EmailOutbox, &key).await {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(err) => warn!(key = %key, error = %err, "skipping unreadable outbox entry"),
        }
    }
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(entries)
}

pub async fn stats(store: &dyn DocumentStore) -> Result<OutboxStats, StoreError> {
    let entries = load_all(store).await?;
    let count = |status: DeliveryStatus| entries.iter().filter(|e| e.status == status).count();
    Ok(OutboxStats {
        total: entries.len(),
        pending: count(DeliveryStatus::Pending),
        sent: count(DeliveryStatus::Sent),
        failed: count(DeliveryStatus::Failed),
    })
}

/// Takes the entry for this worker by pushing its retry time past the lease.
///
/// Returns the leased entry and its version, or `None` when another worker
/// got there first or the entry is no longer due.
async fn lease(
    store: &dyn DocumentStore,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<QueuedEmail>, StoreError> {
    let Some(current) = store.get_versioned(Bucket::EmailOutbox, id).await? else {
        return Ok(None);
    };
    let mut entry: QueuedEmail =
        serde_json::from_value(current.value).map_err(|err| StoreError::Corrupt {
            key: id.to_string(),
            message: err.to_string(),
        })?;
    if !entry.is_due(now) {
        return Ok(None);
    }

    entry.next_retry_at = Some(now + ChronoDuration::seconds(LEASE_SECS));
    let value = serde_json::to_value(&entry).map_err(|err| StoreError::Corrupt {
        key: id.to_string(),
        message: err.to_string(),
    })?;
    match store
        .set_if_version(Bucket::EmailOutbox, id, value, current.version)
        .await
    {
        Ok(_) => Ok(Some(entry)),
        Err(StoreError::VersionConflict { .. }) => {
            debug!(id, "outbox entry leased by another worker");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Delivers every due entry once.
pub async fn drain_once(
    notifications: &NotificationService,
    now: DateTime<Utc>,
) -> Result<DrainReport, StoreError> {
    let store = notifications.store();
    let mut report = DrainReport::default();

    let due: Vec<String> = load_all(store)
        .await?
        .into_iter()
        .filter(|entry| entry.is_due(now))
        .take(DRAIN_BATCH)
        .map(|entry| entry.id)
        .collect();

    for id in due {
        let Some(mut entry) = lease(store, &id, now).await? else {
            continue;
        };
        report.attempted += 1;

        match notifications.provider().send(&entry.message).await {
            Ok(message_id) => {
                entry.record_success(now);
                report.sent += 1;
                crate::metrics::record_email("sent");
                notifications
                    .record_status(&EmailStatusRecord {
                        message_id: entry.id.clone(),
                        status: DeliveryStatus::Sent,
                        kind: entry.kind,
                        timestamp: now,
                        error: None,
                    })
                    .await;
                info!(id = %entry.id, %message_id, attempts = entry.attempts, "queued email delivered");
            }
            Err(err) => {
                entry.record_failure(err.to_string(), now);
                let status = entry.status;
                if status == DeliveryStatus::Failed {
                    report.failed += 1;
                    crate::metrics::record_email("failed");
                    error!(id = %entry.id, error = %err, "email delivery abandoned after retries");
                } else {
                    report.rescheduled += 1;
                    warn!(id = %entry.id, error = %err, next_retry_at = ?entry.next_retry_at, "email retry failed");
                }
                notifications
                    .record_status(&EmailStatusRecord {
                        message_id: entry.id.clone(),
                        status,
                        kind: entry.kind,
                        timestamp: now,
                        error: entry.last_error.clone(),
                    })
                    .await;
            }
        }

        put_doc(store, Bucket::EmailOutbox, &entry.id, &entry).await?;
    }

    Ok(report)
}

/// Drops finished entries past the retention window, then the oldest finished
/// entries while the outbox holds more than `max_entries`. Pending entries are
/// never removed.
pub async fn cleanup(
    store: &dyn DocumentStore,
    now: DateTime<Utc>,
    retention_days: i64,
    max_entries: usize,
) -> Result<usize, StoreError> {
    let entries = load_all(store).await?;
    let cutoff = now - ChronoDuration::days(retention_days);
    let mut remaining = entries.len();
    let mut removed = 0;

    for entry in entries.iter().filter(|e| e.is_finished()) {
        let expired = entry.created_at < cutoff;
        if expired || remaining > max_entries {
            if store.delete(Bucket::EmailOutbox, &entry.id).await? {
                removed += 1;
                remaining -= 1;
            }
        }
    }

    if removed > 0 {
        info!(removed, "outbox cleaned up");
    }
    Ok(removed)
}

/// Puts a failed entry back in the queue for one more attempt.
pub async fn retry_now(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Option<QueuedEmail>, StoreError> {
    let Some(mut entry) = get_doc::<QueuedEmail>(store, Bucket::EmailOutbox, id).await? else {
        return Ok(None);
    };
    if entry.status == DeliveryStatus::Failed {
        entry.status = DeliveryStatus::Pending;
    }
    entry.next_retry_at = None;
    put_doc(store, Bucket::EmailOutbox, id, &entry).await?;
    Ok(Some(entry))
}

/// Background worker polling the outbox on a fixed interval.
pub fn start_worker(
    notifications: Arc<NotificationService>,
    poll_interval: Duration,
    retention_days: i64,
    max_entries: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match drain_once(&notifications, now).await {
                Ok(report) if report.attempted > 0 => {
                    info!(?report, "outbox drained");
                }
                Ok(_) => {}
                Err(e) => error!("outbox worker error: {}", e),
            }
            if let Err(e) = cleanup(notifications.store(), now, retention_days, max_entries).await
            {
                error!("outbox cleanup error: {}", e);
            }
        }
    })
}
