//! HTTP API
//!
//! Three surfaces: the health probe, the POS webhook receiver, and the
//! manual sync triggers used by operators and the admin dashboard.

pub mod clover_webhook;
pub mod health;
pub mod sync;

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // POS webhook: raw body, signature-verified inside the handler
        .route("/clover/webhook", post(clover_webhook::handle_webhook))
        // Manual triggers
        .route("/api/sync/orders/poll", get(sync::trigger_poll))
        .route("/api/sync/orders/{id}/push", post(sync::trigger_push))
        .route("/api/sync/orders/{id}/history", get(sync::order_history))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
