//! 统一错误处理系统
//!
//! Unified error handling for the sync workspace:
//!
//! - [`ErrorCode`]: Numeric error codes organized by category bands
//! - [`ErrorCategory`]: High-level grouping derived from the code value
//! - [`AppError`]: The application error type carrying code + message + details
//! - [`ApiResponse`]: Uniform HTTP response envelope
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, AppResult};
//!
//! fn find_order(code: &str) -> AppResult<()> {
//!     if code.is_empty() {
//!         return Err(AppError::new(ErrorCode::OrderNotFound));
//!     }
//!     Ok(())
//! }
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
