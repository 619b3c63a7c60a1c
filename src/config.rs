use std::env;
use std::time::Duration;

use anyhow::Context;

/// Upper bound for `JWT_TTL_HOURS` (one year).
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub request_timeout: Duration,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_ttl_hours = parse_ttl_hours(env::var("JWT_TTL_HOURS").ok().as_deref());
        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "no"))
            .unwrap_or(true);
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            request_timeout,
            run_migrations,
        })
    }

    /// Settings for an in-memory SQLite store with a fixed secret.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 1,
            request_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

fn parse_ttl_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|h| h.trim().parse::<i64>().ok())
        .filter(|h| *h > 0)
        .map(|h| h.min(MAX_JWT_TTL_HOURS))
        .unwrap_or(24)
}
