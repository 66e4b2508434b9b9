//! Outbound push queue
//!
//! Locally-created orders are pushed to the POS through a durable queue:
//! every job lives in `push_jobs` before the worker ever sees it, so
//! crashes lose nothing. The mpsc channel is only a wakeup signal; the
//! periodic scan picks up whatever the channel missed, including retries
//! whose backoff window has elapsed.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::models::{PushJob, PushJobStatus};
use shared::util::now_millis;

use crate::clover::order_state_label;
use crate::db;
use crate::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A job leaves the retry cycle after this many failed attempts.
pub const MAX_PUSH_ATTEMPTS: i64 = 5;
/// Backoff after the first failure; doubles per attempt.
const RETRY_BASE_DELAY_SECS: u64 = 1;
const RETRY_MAX_DELAY_SECS: u64 = 60;
const QUEUE_SCAN_INTERVAL_SECS: u64 = 30;
/// Finished jobs kept per terminal status for inspection.
const RETAIN_FINISHED_JOBS: i64 = 100;

/// Producer half of the queue: durable insert plus a worker nudge.
#[derive(Clone)]
pub struct PushQueue {
    tx: mpsc::Sender<i64>,
}

impl PushQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<i64>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Insert a pending job and wake the worker. The row is the source of
    /// truth; a full or closed channel only delays pickup until the next
    /// scan.
    pub async fn enqueue(&self, pool: &SqlitePool, order_id: i64, order_code: Option<&str>, force: bool) -> Result<i64, BoxError> {
        let job_id = db::push_jobs::enqueue(pool, order_id, order_code, force).await?;
        if let Err(e) = self.tx.try_send(job_id) {
            tracing::debug!(job_id, error = %e, "Push worker nudge skipped, scan will pick the job up");
        }
        tracing::info!(job_id, order_id, force, "Push job enqueued");
        Ok(job_id)
    }
}

enum PushError {
    /// The order row vanished. Permanent, retries cannot help.
    OrderMissing,
    Transient(BoxError),
}

pub struct PushWorker {
    state: AppState,
}

impl PushWorker {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Drain nudges and scan the table until shutdown.
    pub async fn run(self, mut rx: mpsc::Receiver<i64>, shutdown: CancellationToken) {
        tracing::info!("Push worker started");

        // Recovery: jobs enqueued while the worker was down.
        self.process_pending_queue().await;

        let mut scan = tokio::time::interval(Duration::from_secs(QUEUE_SCAN_INTERVAL_SECS));
        scan.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Push worker shutting down");
                    break;
                }
                job_id = rx.recv() => {
                    match job_id {
                        Some(job_id) => self.process_job_id(job_id).await,
                        None => {
                            tracing::info!("Push channel closed, push worker stopping");
                            break;
                        }
                    }
                }
                _ = scan.tick() => {
                    self.process_pending_queue().await;
                }
            }
        }
    }

    /// One scan pass: attempt every pending job whose backoff window has
    /// elapsed, then prune old finished jobs.
    async fn process_pending_queue(&self) {
        let jobs = match db::push_jobs::pending(&self.state.pool).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load pending push jobs");
                return;
            }
        };

        for job in &jobs {
            if should_attempt(job, now_millis()) {
                self.attempt(job).await;
            }
        }

        if let Err(e) = db::push_jobs::prune_finished(&self.state.pool, RETAIN_FINISHED_JOBS).await {
            tracing::warn!(error = %e, "Failed to prune finished push jobs");
        }
    }

    async fn process_job_id(&self, job_id: i64) {
        match db::push_jobs::find(&self.state.pool, job_id).await {
            Ok(Some(job)) if job.status == PushJobStatus::Pending && should_attempt(&job, now_millis()) => {
                self.attempt(&job).await;
            }
            Ok(_) => {}
            Err(e) => tracing::error!(job_id, error = %e, "Failed to load push job"),
        }
    }

    async fn attempt(&self, job: &PushJob) {
        // Gate check happens per attempt, not at enqueue time: ops may
        // toggle sync while jobs are queued. Forced jobs push regardless.
        if !self.state.sync_enabled && !job.force {
            tracing::info!(job_id = job.id, order_id = job.order_id, "Sync disabled, completing push job without a POS call");
            if let Err(e) = db::push_jobs::mark_completed(&self.state.pool, job.id).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to complete gated push job");
            }
            return;
        }

        match self.push_order(job).await {
            Ok(clover_order_id) => {
                tracing::info!(
                    job_id = job.id,
                    order_id = job.order_id,
                    clover_order_id = %clover_order_id,
                    "Order pushed to POS"
                );
                if let Err(e) = db::push_jobs::mark_completed(&self.state.pool, job.id).await {
                    tracing::error!(job_id = job.id, error = %e, "Failed to mark push job completed");
                }
            }
            Err(PushError::OrderMissing) => {
                tracing::error!(job_id = job.id, order_id = job.order_id, "Push job references a missing order, failing permanently");
                if let Err(e) = db::push_jobs::mark_failed(&self.state.pool, job.id, "order not found").await {
                    tracing::error!(job_id = job.id, error = %e, "Failed to mark push job failed");
                }
            }
            Err(PushError::Transient(e)) => {
                tracing::warn!(
                    job_id = job.id,
                    order_id = job.order_id,
                    attempt = job.attempts + 1,
                    max_attempts = MAX_PUSH_ATTEMPTS,
                    error = %e,
                    "Push attempt failed"
                );
                if let Err(e2) = db::push_jobs::record_failure(&self.state.pool, job.id, &e.to_string(), MAX_PUSH_ATTEMPTS).await {
                    tracing::error!(job_id = job.id, error = %e2, "Failed to record push failure");
                }
            }
        }
    }

    /// Re-read the order (its state may have moved since enqueue) and
    /// perform the idempotent POS upsert.
    async fn push_order(&self, job: &PushJob) -> Result<String, PushError> {
        let order = db::orders::find_by_id(&self.state.pool, job.order_id)
            .await
            .map_err(PushError::Transient)?
            .ok_or(PushError::OrderMissing)?;

        let location_id = self.state.location_id().await.map_err(PushError::Transient)?;

        let clover_order_id = self
            .state
            .clover
            .upsert_order(
                &location_id,
                order.clover_order_id.as_deref(),
                &order.code,
                order_state_label(order.status),
            )
            .await
            .map_err(PushError::Transient)?;

        db::orders::mark_synced(&self.state.pool, order.id, &clover_order_id)
            .await
            .map_err(PushError::Transient)?;

        Ok(clover_order_id)
    }
}

/// Backoff gate. A fresh job runs immediately; after n failures the next
/// attempt waits base * 2^(n-1) seconds, capped.
pub fn should_attempt(job: &PushJob, now_ms: i64) -> bool {
    if job.attempts == 0 {
        return true;
    }
    let Some(last) = job.last_attempt_at else {
        return true;
    };
    let exp = job.attempts.saturating_sub(1).min(6) as u32;
    let delay_secs = (RETRY_BASE_DELAY_SECS * 2u64.pow(exp)).min(RETRY_MAX_DELAY_SECS);
    now_ms >= last + (delay_secs as i64) * 1000
}
