//! Shared application state

use sqlx::SqlitePool;

use crate::clover::{CloverClient, LocationResolver};
use crate::config::Config;
use crate::db;
use crate::sync::push::PushQueue;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub clover: CloverClient,
    /// HMAC secret for webhook signature verification
    pub clover_app_secret: String,
    /// Gate for outbound pushes (inbound reconciliation always runs)
    pub sync_enabled: bool,
    pub poll_interval_secs: u64,
    pub locations: LocationResolver,
    /// Producer half of the outbound push queue
    pub push: PushQueue,
}

impl AppState {
    /// Open the database, run migrations, and wire up the POS client.
    pub async fn new(config: &Config, push: PushQueue) -> Result<Self, BoxError> {
        let pool = db::connect(&config.database_path).await?;
        let clover = CloverClient::new(&config.clover_api_base, &config.clover_api_token)?;
        let locations = LocationResolver::new(config.clover_location_id.clone());

        Ok(Self {
            pool,
            clover,
            clover_app_secret: config.clover_app_secret.clone(),
            sync_enabled: config.sync_enabled,
            poll_interval_secs: config.poll_interval_secs,
            locations,
            push,
        })
    }

    /// Resolve the POS location id through the cascade, discovering via the
    /// device list on a cold miss.
    pub async fn location_id(&self) -> Result<String, BoxError> {
        let client = self.clover.clone();
        self.locations
            .get_or_discover(&self.pool, move || async move { client.first_device_location().await })
            .await
    }
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory database, POS client pointed at nothing.
    pub async fn for_tests(sync_enabled: bool) -> Self {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let (push, _rx) = PushQueue::channel(16);
        Self {
            pool,
            clover: CloverClient::new("http://127.0.0.1:0", "test-token").unwrap(),
            clover_app_secret: "abc123".to_string(),
            sync_enabled,
            poll_interval_secs: 900,
            locations: LocationResolver::new(None),
            push,
        }
    }
}
