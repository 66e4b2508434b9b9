//! Polling fallback
//!
//! Webhooks are the primary ingestion path but deliveries get lost: POS
//! outages, network partitions, our own downtime. A scheduled poll asks
//! the POS for recently modified orders and replays them through the
//! reconciler, which makes re-seeing already-applied changes free.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use shared::models::PollOutcome;
use shared::util::now_millis;

use crate::clover::{CloverOrderRecord, map_order_state};
use crate::state::AppState;
use crate::sync::reconcile::{self, ReconcileOutcome, StatusEvent};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Trailing lookback per cycle. Slightly wider than the default cadence so
/// consecutive windows overlap instead of leaving gaps.
pub const DEFAULT_POLL_WINDOW_MS: i64 = 15 * 60 * 1000;

pub struct PollWorker {
    state: AppState,
}

impl PollWorker {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Poll on a fixed cadence until shutdown. Cycle failures are logged
    /// and the loop keeps going; the next window overlaps this one.
    pub async fn run(self, shutdown: CancellationToken) {
        let period = Duration::from_secs(self.state.poll_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Swallow the immediate first tick: webhooks carry the load while
        // the service warms up.
        ticker.tick().await;

        tracing::info!(period_secs = period.as_secs(), "Poll worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Poll worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let since_ms = now_millis() - DEFAULT_POLL_WINDOW_MS;
                    match poll_since(&self.state, since_ms).await {
                        Ok(outcome) => {
                            tracing::info!(checked = outcome.checked, updated = outcome.updated, "Poll cycle finished");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Poll cycle failed");
                        }
                    }
                }
            }
        }
    }
}

/// One polling pass: fetch POS orders modified after `since_ms` and replay
/// them through the reconciler.
pub async fn poll_since(state: &AppState, since_ms: i64) -> Result<PollOutcome, BoxError> {
    let location_id = state.location_id().await?;
    let records = state.clover.orders_modified_since(&location_id, since_ms).await?;
    Ok(apply_poll_batch(&state.pool, records).await)
}

/// Replay fetched records. Every record counts as checked, including the
/// ones skipped for missing reference or unknown state; a failing record
/// is logged and does not abort the batch.
pub async fn apply_poll_batch(pool: &SqlitePool, records: Vec<CloverOrderRecord>) -> PollOutcome {
    let mut outcome = PollOutcome::default();

    for record in records {
        outcome.checked += 1;

        let Some(order_code) = record.external_reference else {
            // Orders created directly on the POS device have no reference
            // back to us.
            tracing::debug!(clover_order_id = ?record.id, "Poll record without external reference, skipping");
            continue;
        };
        let Some(status) = record.state.as_deref().and_then(map_order_state) else {
            tracing::debug!(order_code = %order_code, state = ?record.state, "Poll record with unmapped state, skipping");
            continue;
        };

        let event = StatusEvent {
            order_code,
            status,
            occurred_at: record.modified_time.unwrap_or_else(now_millis),
            actor: None,
            clover_order_id: record.id,
            checkout_session_id: None,
            source: reconcile::SOURCE_POLL,
        };

        match reconcile::apply_status_event(pool, &event).await {
            Ok(ReconcileOutcome::Updated) => outcome.updated += 1,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(order_code = %event.order_code, error = %e, "Poll record failed, continuing batch");
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::db;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn record(id: &str, reference: Option<&str>, state: Option<&str>, modified: i64) -> CloverOrderRecord {
        CloverOrderRecord {
            id: Some(id.to_string()),
            external_reference: reference.map(String::from),
            state: state.map(String::from),
            modified_time: Some(modified),
        }
    }

    #[tokio::test]
    async fn batch_counts_checked_and_updated() {
        let pool = test_pool().await;
        db::orders::create(&pool, "ORD-1", OrderStatus::Received).await.unwrap();
        // Already where the POS says it is: checked but not updated.
        let in_sync = db::orders::create(&pool, "ORD-2", OrderStatus::Ready).await.unwrap();

        let outcome = apply_poll_batch(
            &pool,
            vec![
                record("CLV-1", Some("ORD-1"), Some("in_progress"), 5_000),
                record("CLV-2", Some("ORD-2"), Some("ready"), 5_000),
                record("CLV-3", Some("ORD-1"), Some("ready"), 6_000),
            ],
        )
        .await;

        assert_eq!(outcome.checked, 3);
        assert_eq!(outcome.updated, 2);

        let unchanged = db::orders::find_by_id(&pool, in_sync.id).await.unwrap().unwrap();
        assert!(db::orders::history(&pool, unchanged.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_without_reference_or_mapping_still_count() {
        let pool = test_pool().await;
        db::orders::create(&pool, "ORD-1", OrderStatus::Received).await.unwrap();

        let outcome = apply_poll_batch(
            &pool,
            vec![
                record("CLV-1", None, Some("ready"), 1_000),
                record("CLV-2", Some("ORD-1"), Some("paid"), 1_000),
                record("CLV-3", Some("ORD-999999"), Some("ready"), 1_000),
            ],
        )
        .await;

        assert_eq!(outcome.checked, 3);
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn poll_events_are_attributed_to_the_poll_source() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-1", OrderStatus::Received).await.unwrap();

        apply_poll_batch(&pool, vec![record("CLV-1", Some("ORD-1"), Some("completed"), 8_000)]).await;

        let trail = db::orders::history(&pool, order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].actor.as_deref(), Some(reconcile::SOURCE_POLL));

        let updated = db::orders::find_by_id(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert_eq!(updated.clover_order_id.as_deref(), Some("CLV-1"));
    }
}
