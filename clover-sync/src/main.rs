//! clover-sync
//!
//! Order-state reconciliation service for the Clover POS. Keeps the local
//! orders database and the POS agreeing on order status through three
//! paths: signed webhooks (primary), a scheduled poll (fallback for missed
//! deliveries), and a durable outbound push queue (local orders toward the
//! POS).

mod api;
mod clover;
mod config;
mod db;
mod error;
mod state;
mod sync;

use config::Config;
use state::AppState;
use sync::poller::PollWorker;
use sync::push::{PushQueue, PushWorker};
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clover_sync=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        environment = %config.environment,
        sync_enabled = config.sync_enabled,
        "Starting clover-sync"
    );

    let (push, push_rx) = PushQueue::channel(256);
    let state = AppState::new(&config, push).await?;

    let shutdown = CancellationToken::new();

    let push_worker = tokio::spawn(PushWorker::new(state.clone()).run(push_rx, shutdown.clone()));
    let poll_worker = tokio::spawn(PollWorker::new(state.clone()).run(shutdown.clone()));

    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("clover-sync listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The signal handler has already cancelled the token; make sure both
    // workers observed it before we close the database.
    shutdown.cancel();
    let _ = push_worker.await;
    let _ = poll_worker.await;

    tracing::info!("clover-sync stopped");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling the shared token so the workers stop
/// alongside the HTTP server.
async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
