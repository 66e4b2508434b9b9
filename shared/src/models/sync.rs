//! Sync Models
//!
//! Rows and payloads for the outbound push queue and the polling job.

use serde::{Deserialize, Serialize};

/// Push job status (推送任务状态)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum PushJobStatus {
    Pending,
    Completed,
    Failed,
}

impl PushJobStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            PushJobStatus::Pending => "pending",
            PushJobStatus::Completed => "completed",
            PushJobStatus::Failed => "failed",
        }
    }
}

/// Durable outbound push job (持久化推送任务)
///
/// One row per requested push. The worker re-fetches the order by
/// `order_id` at execution time; `order_code` is carried for logging only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PushJob {
    pub id: i64,
    pub order_id: i64,
    pub order_code: Option<String>,
    /// Bypass the global sync feature gate
    pub force: bool,
    pub status: PushJobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    /// When the most recent attempt started (millis)
    pub last_attempt_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of one polling pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Records inspected (including skipped ones)
    pub checked: u64,
    /// Orders whose status actually changed
    pub updated: u64,
}

/// Response body of the manual push trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAccepted {
    pub enqueued: bool,
    pub order_id: i64,
    pub force: bool,
}
