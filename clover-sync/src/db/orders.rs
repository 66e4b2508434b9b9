//! Order repository
//!
//! The local `orders` table is the source of truth for order state. POS
//! correlation columns (`clover_order_id`, `checkout_session_id`) are only
//! ever filled in, never cleared, by sync traffic.

use shared::models::{Order, OrderStatus, OrderStatusHistory};
use shared::util::now_millis;
use sqlx::SqlitePool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Insert a new order at its initial status.
pub async fn create(pool: &SqlitePool, code: &str, status: OrderStatus) -> Result<Order, BoxError> {
    let now = now_millis();
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (code, status, status_changed_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(code)
    .bind(status.as_db())
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(order)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Order>, BoxError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(order)
}

/// Look up an order by its human-readable code (the POS external reference).
pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Order>, BoxError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(order)
}

/// Apply a status transition and append the matching history row, in one
/// transaction.
///
/// The update is conditional on the status actually changing, so concurrent
/// duplicate deliveries produce at most one history row. `occurred_at` is the
/// business timestamp of the change (not the wall clock of this call);
/// correlation ids are merged via COALESCE so later events without them do
/// not erase earlier ones.
///
/// Returns `false` (and writes nothing) when the order was already at the
/// target status.
#[allow(clippy::too_many_arguments)]
pub async fn transition_status(
    pool: &SqlitePool,
    order_id: i64,
    status: OrderStatus,
    occurred_at: i64,
    actor: Option<&str>,
    employee_id: Option<i64>,
    clover_order_id: Option<&str>,
    checkout_session_id: Option<&str>,
) -> Result<bool, BoxError> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE orders
         SET status = ?,
             status_changed_at = ?,
             clover_order_id = COALESCE(?, clover_order_id),
             checkout_session_id = COALESCE(?, checkout_session_id),
             clover_last_sync_at = ?,
             updated_at = ?
         WHERE id = ? AND status <> ?",
    )
    .bind(status.as_db())
    .bind(occurred_at)
    .bind(clover_order_id)
    .bind(checkout_session_id)
    .bind(now)
    .bind(now)
    .bind(order_id)
    .bind(status.as_db())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, actor, employee_id, changed_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(status.as_db())
    .bind(actor)
    .bind(employee_id)
    .bind(occurred_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Record a successful outbound push: POS order id plus sync watermark.
pub async fn mark_synced(pool: &SqlitePool, order_id: i64, clover_order_id: &str) -> Result<(), BoxError> {
    let now = now_millis();
    sqlx::query(
        "UPDATE orders
         SET clover_order_id = ?, clover_last_sync_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(clover_order_id)
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full status trail for one order, oldest first.
pub async fn history(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderStatusHistory>, BoxError> {
    let rows = sqlx::query_as::<_, OrderStatusHistory>(
        "SELECT * FROM order_status_history WHERE order_id = ? ORDER BY changed_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
