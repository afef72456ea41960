use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Retries allowed after the first failed delivery.
pub const MAX_RETRIES: u32 = 3;

/// Wait before retry N (1-based).
pub const RETRY_DELAYS_MINUTES: [i64; MAX_RETRIES as usize] = [1, 5, 15];

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EmailKind {
    OrderConfirmation,
    OwnerNotification,
    Tracking,
    Welcome,
    AbandonedCart,
    Generic,
}

/// Which abandoned-cart reminder this is; later ones go out after longer gaps.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReminderType {
    #[default]
    First,
    Second,
    Third,
}

impl ReminderType {
    pub fn delay_text(&self) -> &'static str {
        match self {
            ReminderType::First => "5 minuten geleden",
            ReminderType::Second => "24 uur geleden",
            ReminderType::Third => "72 uur geleden",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// An email waiting in the outbox for another delivery attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEmail {
    pub id: String,
    pub kind: EmailKind,
    pub message: EmailMessage,
    pub created_at: DateTime<Utc>,
    /// Failed delivery attempts so far, including the first one.
    pub attempts: u32,
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueuedEmail {
    /// Entry for a message whose first delivery attempt just failed.
    pub fn after_failure(
        kind: EmailKind,
        message: EmailMessage,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id: format!("email-{}", Uuid::new_v4()),
            kind,
            message,
            created_at: now,
            attempts: 0,
            next_retry_at: None,
            last_error: None,
            status: DeliveryStatus::Pending,
            sent_at: None,
        };
        entry.record_failure(error, now);
        entry
    }

    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_error = Some(error.into());

        // attempts - 1 retries have happened; schedule the next one if any remain.
        match RETRY_DELAYS_MINUTES.get((self.attempts - 1) as usize) {
            Some(minutes) => {
                self.next_retry_at = Some(now + Duration::minutes(*minutes));
            }
            None => {
                self.status = DeliveryStatus::Failed;
                self.next_retry_at = None;
            }
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Sent;
        self.sent_at = Some(now);
        self.next_retry_at = None;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Pending
            && self.next_retry_at.map(|at| at <= now).unwrap_or(true)
    }

    pub fn is_finished(&self) -> bool {
        self.status != DeliveryStatus::Pending
    }
}

/// Delivery record looked up by message id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatusRecord {
    pub message_id: String,
    pub status: DeliveryStatus,
    pub kind: EmailKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Number of records returned in [`EmailStats::recent_statuses`].
pub const RECENT_STATUS_LIMIT: usize = 10;

/// Delivery statistics over every recorded message.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailStats {
    pub total_sent: usize,
    pub sent_today: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Share of records that were delivered, e.g. `"66.67%"`.
    pub success_rate: String,
    /// Latest records, oldest first.
    pub recent_statuses: Vec<EmailStatusRecord>,
}

impl EmailStats {
    pub fn from_records(mut records: Vec<EmailStatusRecord>, now: DateTime<Utc>) -> Self {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let today = now.date_naive();
        let sent_today = records
            .iter()
            .filter(|r| r.timestamp.date_naive() == today)
            .count();
        let success_count = records
            .iter()
            .filter(|r| r.status == DeliveryStatus::Sent)
            .count();
        let failure_count = records
            .iter()
            .filter(|r| r.status == DeliveryStatus::Failed)
            .count();
        let success_rate = if records.is_empty() {
            "0.00%".to_string()
        } else {
            format!(
                "{:.2}%",
                success_count as f64 * 100.0 / records.len() as f64
            )
        };

        let recent_statuses = records
            .iter()
            .skip(records.len().saturating_sub(RECENT_STATUS_LIMIT))
            .cloned()
            .collect();

        Self {
            total_sent: records.len(),
            sent_today,
            success_count,
            failure_count,
            success_rate,
            recent_statuses,
        }
    }
}
