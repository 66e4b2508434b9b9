//! System Setting Model

use serde::{Deserialize, Serialize};

/// Key-value system setting row (系统设置)
///
/// Small singleton values that must survive restarts, e.g. the discovered
/// POS location id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}
