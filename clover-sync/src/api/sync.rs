//! Manual sync triggers
//!
//! Operator-facing endpoints: run a polling pass now, enqueue a push for
//! one order, and inspect an order's status trail. The push endpoint
//! answers 202 in both gate outcomes; `enqueued` tells the caller whether
//! a job was actually written.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::{OrderStatusHistory, PushAccepted};
use shared::util::now_millis;

use crate::db;
use crate::error::ServiceResult;
use crate::state::AppState;
use crate::sync::poller;

#[derive(Debug, Deserialize)]
pub struct PollParams {
    /// ISO-8601 lower bound for the modification window
    pub since: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushParams {
    /// Push even while sync is globally disabled
    pub force: Option<bool>,
}

/// GET /api/sync/orders/poll
pub async fn trigger_poll(
    State(state): State<AppState>,
    Query(params): Query<PollParams>,
) -> ServiceResult<Json<Value>> {
    let since_ms = match &params.since {
        Some(raw) => parse_since(raw)
            .ok_or_else(|| AppError::validation(format!("since must be an ISO-8601 timestamp, got {raw:?}")))?,
        None => now_millis() - poller::DEFAULT_POLL_WINDOW_MS,
    };

    let outcome = poller::poll_since(&state, since_ms).await?;

    let since_echo = DateTime::<Utc>::from_timestamp_millis(since_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    Ok(Json(json!({
        "checked": outcome.checked,
        "updated": outcome.updated,
        "since": since_echo,
    })))
}

/// POST /api/sync/orders/{id}/push
pub async fn trigger_push(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Query(params): Query<PushParams>,
) -> ServiceResult<(StatusCode, Json<PushAccepted>)> {
    let force = params.force.unwrap_or(false);

    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    // Gate at the door: while sync is disabled an unforced request is
    // acknowledged without writing a job.
    if !state.sync_enabled && !force {
        tracing::info!(order_id, "Push requested while sync is disabled, nothing enqueued");
        return Ok((
            StatusCode::ACCEPTED,
            Json(PushAccepted { enqueued: false, order_id, force }),
        ));
    }

    state.push.enqueue(&state.pool, order.id, Some(&order.code), force).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PushAccepted { enqueued: true, order_id, force }),
    ))
}

/// GET /api/sync/orders/{id}/history
pub async fn order_history(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ServiceResult<ApiResponse<Vec<OrderStatusHistory>>> {
    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    let trail = db::orders::history(&state.pool, order.id).await?;
    Ok(ApiResponse::success(trail))
}

fn parse_since(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.timestamp_millis())
}
