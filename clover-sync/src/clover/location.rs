//! POS location id resolution
//!
//! The location id scopes every Clover API call, but deployments rarely
//! configure it by hand. Resolution cascades through cheap sources first:
//!
//!   memory cache → env override → persisted setting → device discovery
//!
//! Discovery hits the POS API, so cold-start callers are single-flighted
//! through a guard and the result is persisted for the next boot. The env
//! override is read-only bootstrap input and is never written back.

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::db;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Settings key holding the discovered location id.
pub const LOCATION_SETTING_KEY: &str = "cloverLocationId";

#[derive(Clone)]
pub struct LocationResolver {
    /// Process-lifetime cache
    cached: Arc<RwLock<Option<String>>>,
    /// Serializes cold-start discovery so N concurrent callers trigger one
    /// device-list call
    discovery_guard: Arc<Mutex<()>>,
    /// Read-only bootstrap override (CLOVER_LOCATION_ID)
    env_override: Option<String>,
}

impl LocationResolver {
    pub fn new(env_override: Option<String>) -> Self {
        Self {
            cached: Arc::new(RwLock::new(None)),
            discovery_guard: Arc::new(Mutex::new(())),
            env_override,
        }
    }

    /// Resolve the location id, running `discover` on a cold miss.
    ///
    /// The guard is dropped on failure, so a later call retries discovery
    /// instead of caching the error.
    pub async fn get_or_discover<F, Fut>(&self, pool: &SqlitePool, discover: F) -> Result<String, BoxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, BoxError>>,
    {
        if let Some(id) = self.cached.read().await.clone() {
            return Ok(id);
        }

        let _guard = self.discovery_guard.lock().await;

        // Double-check: another caller may have resolved while we waited.
        if let Some(id) = self.cached.read().await.clone() {
            return Ok(id);
        }

        if let Some(id) = self.env_override.clone() {
            *self.cached.write().await = Some(id.clone());
            return Ok(id);
        }

        if let Some(setting) = db::settings::get(pool, LOCATION_SETTING_KEY).await? {
            *self.cached.write().await = Some(setting.value.clone());
            return Ok(setting.value);
        }

        tracing::info!("No location id configured, discovering via POS device list");
        let discovered = discover()
            .await?
            .filter(|id| !id.is_empty())
            .ok_or("location discovery returned no device with a location id")?;

        db::settings::upsert(pool, LOCATION_SETTING_KEY, &discovered).await?;
        *self.cached.write().await = Some(discovered.clone());
        tracing::info!(location_id = %discovered, "Discovered and persisted POS location id");

        Ok(discovered)
    }

    /// Adopt a location id reported by webhook traffic (multi-location
    /// merchants). No-op when it matches the cached value.
    pub async fn update(&self, pool: &SqlitePool, new_id: &str) -> Result<(), BoxError> {
        if new_id.is_empty() {
            return Ok(());
        }
        if self.cached.read().await.as_deref() == Some(new_id) {
            return Ok(());
        }

        db::settings::upsert(pool, LOCATION_SETTING_KEY, new_id).await?;
        *self.cached.write().await = Some(new_id.to_string());
        tracing::info!(location_id = %new_id, "POS location id updated from webhook traffic");
        Ok(())
    }
}
