//! Ledger configuration
//!
//! Values come from `WALLET_LEDGER_*` environment variables (a `.env` file is
//! loaded by the binary beforehand) and fall back to defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Prefix of every environment variable read by [`LedgerConfig::from_env`]
pub const ENV_PREFIX: &str = "WALLET_LEDGER_";

/// Runtime configuration of the wallet service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// First segment of every cache key
    pub cache_namespace: String,

    /// Entries per history page
    pub history_page_size: u32,

    /// Deadline of an atomic unit when the request carries none
    pub unit_timeout: Duration,

    /// Lifetime of cached read views
    pub cache_ttl: Duration,

    /// Capacity of the notification queues
    pub notification_buffer: usize,

    /// PostgreSQL connection URL (`postgres` feature)
    pub database_url: Option<String>,

    /// Redis connection URL (`redis` feature)
    pub redis_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cache_namespace: "wallet".to_string(),
            history_page_size: 10,
            unit_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(5 * 60),
            notification_buffer: 64,
            database_url: None,
            redis_url: None,
        }
    }
}

impl LedgerConfig {
    /// Create config from environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `WALLET_LEDGER_CACHE_NAMESPACE` | `cache_namespace` |
    /// | `WALLET_LEDGER_HISTORY_PAGE_SIZE` | `history_page_size` |
    /// | `WALLET_LEDGER_UNIT_TIMEOUT_MS` | `unit_timeout` |
    /// | `WALLET_LEDGER_CACHE_TTL_SECS` | `cache_ttl` |
    /// | `WALLET_LEDGER_NOTIFICATION_BUFFER` | `notification_buffer` |
    /// | `WALLET_LEDGER_DATABASE_URL` | `database_url` |
    /// | `WALLET_LEDGER_REDIS_URL` | `redis_url` |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix)).filter(|value| !value.trim().is_empty())
        };
        let number = |suffix: &str| -> Option<u64> {
            let raw = var(suffix)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(variable = %format!("{}{}", ENV_PREFIX, suffix), value = %raw, "Ignoring unparsable value");
                    None
                }
            }
        };

        let default = Self::default();
        Self::new(
            var("CACHE_NAMESPACE").unwrap_or(default.cache_namespace),
            number("HISTORY_PAGE_SIZE")
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(default.history_page_size),
            number("UNIT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.unit_timeout),
            number("CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.cache_ttl),
            number("NOTIFICATION_BUFFER")
                .map(|v| v as usize)
                .unwrap_or(default.notification_buffer),
        )
        .with_backends(var("DATABASE_URL"), var("REDIS_URL"))
    }

    /// Create a config with custom values
    ///
    /// Zero values are invalid and fall back to the defaults with a warning.
    pub fn new(
        cache_namespace: String,
        history_page_size: u32,
        unit_timeout: Duration,
        cache_ttl: Duration,
        notification_buffer: usize,
    ) -> Self {
        let default = Self::default();

        let history_page_size = if history_page_size == 0 {
            warn!(
                "Invalid history_page_size ({}), using default ({})",
                history_page_size, default.history_page_size
            );
            default.history_page_size
        } else {
            history_page_size
        };

        let unit_timeout = if unit_timeout.is_zero() {
            warn!(
                "Invalid unit_timeout ({:?}), using default ({:?})",
                unit_timeout, default.unit_timeout
            );
            default.unit_timeout
        } else {
            unit_timeout
        };

        let cache_ttl = if cache_ttl.is_zero() {
            warn!(
                "Invalid cache_ttl ({:?}), using default ({:?})",
                cache_ttl, default.cache_ttl
            );
            default.cache_ttl
        } else {
            cache_ttl
        };

        let notification_buffer = if notification_buffer == 0 {
            warn!(
                "Invalid notification_buffer ({}), using default ({})",
                notification_buffer, default.notification_buffer
            );
            default.notification_buffer
        } else {
            notification_buffer
        };

        Self {
            cache_namespace,
            history_page_size,
            unit_timeout,
            cache_ttl,
            notification_buffer,
            database_url: None,
            redis_url: None,
        }
    }

    /// Attach backend connection URLs
    pub fn with_backends(mut self, database_url: Option<String>, redis_url: Option<String>) -> Self {
        self.database_url = database_url;
        self.redis_url = redis_url;
        self
    }
}
