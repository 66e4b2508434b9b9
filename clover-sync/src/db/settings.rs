//! System settings repository (系统设置)
//!
//! Small key/value store for operational state that must survive restarts,
//! such as the discovered POS location id.

use shared::models::SystemSetting;
use shared::util::now_millis;
use sqlx::SqlitePool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<SystemSetting>, BoxError> {
    let setting = sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(setting)
}

pub async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> Result<(), BoxError> {
    let now = now_millis();
    sqlx::query(
        "INSERT INTO system_settings (key, value, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE system_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let pool = test_pool().await;
        assert!(get(&pool, "cloverLocationId").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let pool = test_pool().await;

        upsert(&pool, "cloverLocationId", "LOC-1").await.unwrap();
        let first = get(&pool, "cloverLocationId").await.unwrap().unwrap();
        assert_eq!(first.value, "LOC-1");

        upsert(&pool, "cloverLocationId", "LOC-2").await.unwrap();
        let second = get(&pool, "cloverLocationId").await.unwrap().unwrap();
        assert_eq!(second.value, "LOC-2");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM system_settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
