//! Service-layer error type for clover-sync
//!
//! Repository functions, the POS client, and the reconciler all surface
//! infrastructure failures; handlers surface business-rule failures as
//! `AppError`. `ServiceError` funnels both so handlers can use `?`
//! throughout, and classifies infrastructure errors into the unified code
//! taxonomy at the HTTP boundary (database vs. network vs. timeout).

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Infrastructure failure (sqlx, reqwest, IO). Logged here, reported
    /// to the client only as its error-code category.
    Infra(BoxError),
    /// Business-rule failure, passed through with its code intact
    App(AppError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infra(Box::new(e))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Infra(Box::new(e))
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        Self::Infra(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        Self::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app) => app,
            ServiceError::Infra(infra) => {
                tracing::error!(error = %infra, "Service infrastructure error");
                AppError::new(classify_infra(&infra))
            }
        }
    }
}

/// Pick the error code for an infrastructure failure. POS connectivity
/// problems map to 503s so callers can tell "retry later" from "we broke".
fn classify_infra(e: &BoxError) -> ErrorCode {
    if let Some(req) = e.downcast_ref::<reqwest::Error>() {
        if req.is_timeout() {
            return ErrorCode::TimeoutError;
        }
        return ErrorCode::NetworkError;
    }
    if e.downcast_ref::<sqlx::Error>().is_some() {
        return ErrorCode::DatabaseError;
    }
    ErrorCode::InternalError
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
