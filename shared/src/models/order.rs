//! Order Model

use serde::{Deserialize, Serialize};

/// Order lifecycle status (订单状态)
///
/// Stored as TEXT in SQLite using the serialized names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    #[default]
    Received,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Database / wire label for this status
    pub fn as_db(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Ready => "READY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse a database label back into a status
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "RECEIVED" => Some(OrderStatus::Received),
            "IN_PROGRESS" => Some(OrderStatus::InProgress),
            "READY" => Some(OrderStatus::Ready),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Order entity
///
/// `code` is the human-facing order code (receipt number), unique and
/// immutable after creation. It is the correlation key against the POS
/// `externalReference` field; the numeric `id` never leaves this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub code: String,
    pub status: OrderStatus,
    /// POS-side order id, learned from webhook events or the first push
    pub clover_order_id: Option<String>,
    /// POS-side checkout session id, if one was reported
    pub checkout_session_id: Option<String>,
    /// Last successful sync with the POS (millis)
    pub clover_last_sync_at: Option<i64>,
    /// Business timestamp of the last applied status transition (millis)
    pub status_changed_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only status history row (状态变更历史)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderStatusHistory {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    /// Who triggered the change: an employee display name or a system label
    pub actor: Option<String>,
    pub employee_id: Option<i64>,
    /// Business timestamp of the change (millis, from the source event)
    pub changed_at: i64,
    pub created_at: i64,
}
