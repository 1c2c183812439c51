//! Server configuration parsed from environment variables.
//!
//! Every knob except `DATABASE_URL` has a default; unparsable values fall
//! back to the default instead of failing startup.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_STORE_FLUSH_INTERVAL_MS: u64 = 250;
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 14;
/// Passwordless sign-in trusts the posted email; off unless asked for.
pub const DEFAULT_DEV_LOGIN: bool = false;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    Missing { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Delay between persistence flushes of dirty store documents.
    pub store_flush_interval_ms: u64,
    /// Per-connection outbound frame queue; snapshots beyond it are dropped.
    pub subscriber_queue_capacity: usize,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    /// Enables `POST /api/auth/login` without any external identity provider.
    pub dev_login: bool,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `STORE_FLUSH_INTERVAL_MS`: default 250
    /// - `SUBSCRIBER_QUEUE_CAPACITY`: default 256
    /// - `SESSION_TTL_HOURS`: default 336
    /// - `COOKIE_SECURE`: default false
    /// - `DEV_LOGIN`: default false
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing { var: "DATABASE_URL" })?;

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            store_flush_interval_ms: env_parse("STORE_FLUSH_INTERVAL_MS", DEFAULT_STORE_FLUSH_INTERVAL_MS),
            subscriber_queue_capacity: env_parse("SUBSCRIBER_QUEUE_CAPACITY", DEFAULT_SUBSCRIBER_QUEUE_CAPACITY)
                .max(1),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            dev_login: env_bool("DEV_LOGIN").unwrap_or(DEFAULT_DEV_LOGIN),
        })
    }

    /// Defaults for everything but the database URL. Used by tests.
    #[must_use]
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            store_flush_interval_ms: DEFAULT_STORE_FLUSH_INTERVAL_MS,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cookie_secure: false,
            dev_login: DEFAULT_DEV_LOGIN,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_bool(&raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
