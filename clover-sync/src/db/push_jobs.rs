//! Push job repository
//!
//! The `push_jobs` table is the durable queue for outbound POS pushes. The
//! worker's in-process channel is only a wakeup: every state change lands
//! here first, so a restart loses nothing.

use shared::models::{PushJob, PushJobStatus};
use shared::util::now_millis;
use sqlx::SqlitePool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Insert a pending push job, returning its id.
pub async fn enqueue(pool: &SqlitePool, order_id: i64, order_code: Option<&str>, force: bool) -> Result<i64, BoxError> {
    let now = now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO push_jobs (order_id, order_code, force, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(order_id)
    .bind(order_code)
    .bind(force)
    .bind(PushJobStatus::Pending.as_db())
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<PushJob>, BoxError> {
    let job = sqlx::query_as::<_, PushJob>("SELECT * FROM push_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// All pending jobs, oldest first.
pub async fn pending(pool: &SqlitePool) -> Result<Vec<PushJob>, BoxError> {
    let jobs = sqlx::query_as::<_, PushJob>(
        "SELECT * FROM push_jobs WHERE status = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(PushJobStatus::Pending.as_db())
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

pub async fn mark_completed(pool: &SqlitePool, id: i64) -> Result<(), BoxError> {
    let now = now_millis();
    sqlx::query("UPDATE push_jobs SET status = ?, updated_at = ? WHERE id = ?")
        .bind(PushJobStatus::Completed.as_db())
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record one failed attempt. The job stays pending until `max_attempts` is
/// reached, at which point it flips to failed and leaves the retry cycle.
pub async fn record_failure(pool: &SqlitePool, id: i64, error: &str, max_attempts: i64) -> Result<(), BoxError> {
    let now = now_millis();
    sqlx::query(
        "UPDATE push_jobs
         SET attempts = attempts + 1,
             last_error = ?,
             last_attempt_at = ?,
             status = CASE WHEN attempts + 1 >= ? THEN 'failed' ELSE 'pending' END,
             updated_at = ?
         WHERE id = ?",
    )
    .bind(error)
    .bind(now)
    .bind(max_attempts)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fail a job immediately, without burning through the remaining attempts.
/// Used when the underlying order no longer exists.
pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> Result<(), BoxError> {
    let now = now_millis();
    sqlx::query(
        "UPDATE push_jobs
         SET status = ?, last_error = ?, last_attempt_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(PushJobStatus::Failed.as_db())
    .bind(error)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop old finished jobs, keeping the most recent `keep` per terminal
/// status. Pending jobs are never touched.
pub async fn prune_finished(pool: &SqlitePool, keep: i64) -> Result<u64, BoxError> {
    let result = sqlx::query(
        "DELETE FROM push_jobs
         WHERE status IN ('completed', 'failed')
           AND id NOT IN (SELECT id FROM push_jobs WHERE status = 'completed' ORDER BY id DESC LIMIT ?)
           AND id NOT IN (SELECT id FROM push_jobs WHERE status = 'failed' ORDER BY id DESC LIMIT ?)",
    )
    .bind(keep)
    .bind(keep)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
