//! Sync service configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sync service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: String,
    /// HTTP port (webhook + manual triggers)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Clover REST API base URL
    pub clover_api_base: String,
    /// Clover webhook HMAC signing secret
    pub clover_app_secret: String,
    /// Clover API bearer token (outbound calls)
    pub clover_api_token: String,
    /// Read-only location id override (env bootstrap, never written back)
    pub clover_location_id: Option<String>,
    /// Global gate for outbound order push
    pub sync_enabled: bool,
    /// Polling fallback cadence in seconds
    pub poll_interval_secs: u64,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/clover-sync.db".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            clover_api_base: std::env::var("CLOVER_API_BASE")
                .unwrap_or_else(|_| "https://api.clover.com".into()),
            clover_app_secret: Self::require_secret("CLOVER_APP_SECRET", &environment)?,
            clover_api_token: Self::require_secret("CLOVER_API_TOKEN", &environment)?,
            clover_location_id: std::env::var("CLOVER_LOCATION_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            sync_enabled: std::env::var("CLOVER_SYNC_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(900),
            environment,
        })
    }
}
