//! Employee Model

use serde::{Deserialize, Serialize};

/// Employee entity (员工)
///
/// Correlated with the POS by `clover_employee_id`. Rows are created
/// lazily when a webhook event first references an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Employee {
    pub id: i64,
    /// External correlation key (UNIQUE)
    pub clover_employee_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}
