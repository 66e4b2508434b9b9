//! Data models
//!
//! Shared between the sync service and any future API consumers.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), all timestamps are
//! UTC millis.

pub mod employee;
pub mod order;
pub mod setting;
pub mod sync;

// Re-exports
pub use employee::*;
pub use order::*;
pub use setting::*;
pub use sync::*;
