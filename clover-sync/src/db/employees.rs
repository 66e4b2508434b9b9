//! Employee repository (员工)
//!
//! Employees are discovered from POS webhook actor attribution and keyed by
//! the POS employee id. The service runs against a single merchant account,
//! so the POS id alone is a sufficient unique key.

use shared::models::Employee;
use shared::util::now_millis;
use sqlx::SqlitePool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Insert or refresh an employee record, returning its local id.
///
/// A repeat upsert with a new display name keeps the same row and updates
/// the name in place.
pub async fn upsert(pool: &SqlitePool, clover_employee_id: &str, name: &str) -> Result<i64, BoxError> {
    let now = now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO employees (clover_employee_id, name, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(clover_employee_id) DO UPDATE SET
             name = excluded.name,
             updated_at = excluded.updated_at
         RETURNING id",
    )
    .bind(clover_employee_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_clover_id(pool: &SqlitePool, clover_employee_id: &str) -> Result<Option<Employee>, BoxError> {
    let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE clover_employee_id = ?")
        .bind(clover_employee_id)
        .fetch_optional(pool)
        .await?;
    Ok(employee)
}
