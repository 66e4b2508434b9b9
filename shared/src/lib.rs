//! Shared types for the Clover sync service
//!
//! Domain models, the unified error system, and small utilities used by
//! the service crate and its future siblings (dashboard, reporting).

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
