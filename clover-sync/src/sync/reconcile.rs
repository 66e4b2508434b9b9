//! Order status reconciliation
//!
//! Both ingestion paths (webhook and poll) reduce their input to a
//! [`StatusEvent`] and hand it to [`apply_status_event`]. All dedup and
//! ordering policy lives here, so the two paths cannot drift apart.

use shared::models::OrderStatus;
use sqlx::SqlitePool;

use crate::db;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Actor attribution carried by a status event.
#[derive(Debug, Clone)]
pub struct EventActor {
    /// POS employee id
    pub external_id: Option<String>,
    pub display_name: Option<String>,
}

/// Narrow validated envelope built at the ingestion boundary.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// Order code (the POS external reference)
    pub order_code: String,
    pub status: OrderStatus,
    /// Business timestamp of the change, UTC millis
    pub occurred_at: i64,
    pub actor: Option<EventActor>,
    pub clover_order_id: Option<String>,
    pub checkout_session_id: Option<String>,
    /// Ingestion path, recorded as the history actor when no human one
    /// is attached
    pub source: &'static str,
}

pub const SOURCE_WEBHOOK: &str = "clover_webhook";
pub const SOURCE_POLL: &str = "clover_poll";

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Status changed, exactly one history row appended
    Updated,
    /// Order already at the reported status
    NoChange,
    /// No local order carries this code
    UnknownOrder,
    /// Event is older than the last applied transition
    Stale,
}

/// Apply one externally-observed status change to the local order record.
///
/// Unknown codes and duplicate or out-of-order deliveries resolve without
/// writes, so the POS can retry the same event any number of times. An
/// event strictly older than the last applied transition is rejected
/// outright: a delayed webhook must not regress an order that has already
/// moved on.
pub async fn apply_status_event(pool: &SqlitePool, event: &StatusEvent) -> Result<ReconcileOutcome, BoxError> {
    let order = match db::orders::find_by_code(pool, &event.order_code).await? {
        Some(order) => order,
        None => {
            // Routine: POS test traffic, or an event racing order creation.
            tracing::warn!(
                order_code = %event.order_code,
                source = event.source,
                "Status event for unknown order, skipping"
            );
            return Ok(ReconcileOutcome::UnknownOrder);
        }
    };

    if order.status == event.status {
        tracing::debug!(order_code = %event.order_code, status = %event.status, "Order already at reported status");
        return Ok(ReconcileOutcome::NoChange);
    }

    if event.occurred_at < order.status_changed_at {
        tracing::debug!(
            order_code = %event.order_code,
            event_at = event.occurred_at,
            applied_at = order.status_changed_at,
            "Stale status event, rejected"
        );
        return Ok(ReconcileOutcome::Stale);
    }

    // Actor upsert sits outside the transition transaction: the employee
    // row is worth keeping even if the transition loses an update race.
    let (actor_label, employee_id) = resolve_actor(pool, event).await?;

    let applied = db::orders::transition_status(
        pool,
        order.id,
        event.status,
        event.occurred_at,
        actor_label.as_deref(),
        employee_id,
        event.clover_order_id.as_deref(),
        event.checkout_session_id.as_deref(),
    )
    .await?;

    if applied {
        tracing::info!(
            order_code = %event.order_code,
            from = %order.status,
            to = %event.status,
            source = event.source,
            "Order status reconciled"
        );
        Ok(ReconcileOutcome::Updated)
    } else {
        // A concurrent writer applied the same status between our read and
        // the conditional update.
        Ok(ReconcileOutcome::NoChange)
    }
}

/// History attribution: the employee's display name when the event carries
/// one, otherwise the ingestion source label.
async fn resolve_actor(pool: &SqlitePool, event: &StatusEvent) -> Result<(Option<String>, Option<i64>), BoxError> {
    let Some(actor) = &event.actor else {
        return Ok((Some(event.source.to_string()), None));
    };

    match &actor.external_id {
        Some(external_id) => {
            let display = actor.display_name.clone().unwrap_or_else(|| external_id.clone());
            let employee_id = db::employees::upsert(pool, external_id, &display).await?;
            Ok((Some(display), Some(employee_id)))
        }
        None => match &actor.display_name {
            Some(name) => Ok((Some(name.clone()), None)),
            None => Ok((Some(event.source.to_string()), None)),
        },
    }
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
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn event(code: &str, status: OrderStatus, occurred_at: i64) -> StatusEvent {
        StatusEvent {
            order_code: code.to_string(),
            status,
            occurred_at,
            actor: None,
            clover_order_id: None,
            checkout_session_id: None,
            source: SOURCE_WEBHOOK,
        }
    }

    #[tokio::test]
    async fn received_order_moves_to_in_progress() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-20250101-AAAA", OrderStatus::Received)
            .await
            .unwrap();

        let outcome = apply_status_event(&pool, &event("ORD-20250101-AAAA", OrderStatus::InProgress, 2_000))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated);

        let updated = db::orders::find_by_id(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(updated.status, OrderStatus::InProgress);

        let trail = db::orders::history(&pool, order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].actor.as_deref(), Some(SOURCE_WEBHOOK));
        // History carries the event's business time, not the wall clock.
        assert_eq!(trail[0].changed_at, 2_000);
    }

    #[tokio::test]
    async fn duplicate_delivery_writes_one_history_row() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-1", OrderStatus::Received).await.unwrap();

        let e = event("ORD-1", OrderStatus::Ready, 5_000);
        assert_eq!(apply_status_event(&pool, &e).await.unwrap(), ReconcileOutcome::Updated);
        assert_eq!(apply_status_event(&pool, &e).await.unwrap(), ReconcileOutcome::NoChange);

        let trail = db::orders::history(&pool, order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn unknown_order_is_skipped_without_writes() {
        let pool = test_pool().await;

        let outcome = apply_status_event(&pool, &event("ORD-999999", OrderStatus::Ready, 1_000))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnknownOrder);

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&pool)
            .await
            .unwrap();
        let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_status_history")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((orders, history), (0, 0));
    }

    #[tokio::test]
    async fn stale_event_is_rejected() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-2", OrderStatus::Received).await.unwrap();

        // Ready lands first (T2), then the delayed InProgress event (T1).
        apply_status_event(&pool, &event("ORD-2", OrderStatus::Ready, 9_000))
            .await
            .unwrap();
        let outcome = apply_status_event(&pool, &event("ORD-2", OrderStatus::InProgress, 4_000))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Stale);

        let current = db::orders::find_by_id(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(current.status, OrderStatus::Ready);
        assert_eq!(current.status_changed_at, 9_000);

        let trail = db::orders::history(&pool, order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn equal_timestamp_transition_is_allowed() {
        let pool = test_pool().await;
        db::orders::create(&pool, "ORD-3", OrderStatus::Received).await.unwrap();

        apply_status_event(&pool, &event("ORD-3", OrderStatus::InProgress, 7_000))
            .await
            .unwrap();
        // Two real transitions within the same second are normal POS
        // behavior and must not be dropped as stale.
        let outcome = apply_status_event(&pool, &event("ORD-3", OrderStatus::Ready, 7_000))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated);
    }

    #[tokio::test]
    async fn actor_is_upserted_and_attributed() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-4", OrderStatus::Received).await.unwrap();

        let mut e = event("ORD-4", OrderStatus::InProgress, 1_000);
        e.actor = Some(EventActor {
            external_id: Some("EMP-7".to_string()),
            display_name: Some("Alice".to_string()),
        });
        apply_status_event(&pool, &e).await.unwrap();

        let employee = db::employees::find_by_clover_id(&pool, "EMP-7").await.unwrap().unwrap();
        assert_eq!(employee.name, "Alice");

        let trail = db::orders::history(&pool, order.id).await.unwrap();
        assert_eq!(trail[0].actor.as_deref(), Some("Alice"));
        assert_eq!(trail[0].employee_id, Some(employee.id));

        // Same employee acting again with a corrected name reuses the row.
        let mut e2 = event("ORD-4", OrderStatus::Ready, 2_000);
        e2.actor = Some(EventActor {
            external_id: Some("EMP-7".to_string()),
            display_name: Some("Alice Zhang".to_string()),
        });
        apply_status_event(&pool, &e2).await.unwrap();

        let refreshed = db::employees::find_by_clover_id(&pool, "EMP-7").await.unwrap().unwrap();
        assert_eq!(refreshed.id, employee.id);
        assert_eq!(refreshed.name, "Alice Zhang");
    }

    #[tokio::test]
    async fn correlation_ids_are_recorded() {
        let pool = test_pool().await;
        let order = db::orders::create(&pool, "ORD-5", OrderStatus::Received).await.unwrap();

        let mut e = event("ORD-5", OrderStatus::InProgress, 1_000);
        e.clover_order_id = Some("CLV-55".to_string());
        e.checkout_session_id = Some("CS-55".to_string());
        apply_status_event(&pool, &e).await.unwrap();

        let updated = db::orders::find_by_id(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(updated.clover_order_id.as_deref(), Some("CLV-55"));
        assert_eq!(updated.checkout_session_id.as_deref(), Some("CS-55"));
        assert!(updated.clover_last_sync_at.is_some());
    }
}
