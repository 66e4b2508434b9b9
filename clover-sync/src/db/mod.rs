//! Database access layer
//!
//! SQLite via sqlx. Repository modules expose free async functions over the
//! pool; multi-statement writes open their own transaction internally.

pub mod employees;
pub mod orders;
pub mod push_jobs;
pub mod settings;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Open (or create) the service database and bring the schema up to date.
pub async fn connect(db_path: &str) -> Result<SqlitePool, BoxError> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON")
        .optimize_on_close(true, None);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // 写冲突时等待 5s 而非立即失败 (webhook 和 worker 共用一个库)
    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(&pool)
        .await?;

    tracing::info!("Database ready at {db_path} (WAL, migrations applied)");

    Ok(pool)
}
