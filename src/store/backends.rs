//! Backend selection from configuration
//!
//! `database_url` picks the Postgres store and `redis_url` the Redis cache;
//! without them both fall back to the in-memory implementations. A database
//! URL that cannot be honoured is an error, since writes would otherwise land
//! in process memory. A cache that cannot be reached only degrades reads, so
//! it falls back with a warning.

use crate::config::LedgerConfig;
use crate::core::traits::{LedgerStore, ViewCache};
use crate::store::{InMemoryCache, InMemoryLedgerStore};
use crate::types::LedgerError;
use std::sync::Arc;
use tracing::{info, warn};

/// Pool size of the Postgres store
#[cfg(feature = "postgres")]
const MAX_CONNECTIONS: u32 = 10;

/// Store and cache a service runs on
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn LedgerStore>,
    pub cache: Arc<dyn ViewCache>,
}

impl Backends {
    /// Fresh in-memory store and cache
    pub fn in_memory() -> Self {
        Backends {
            store: Arc::new(InMemoryLedgerStore::new()),
            cache: Arc::new(InMemoryCache::new()),
        }
    }

    /// Connect the backends named by `config`
    pub async fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let store = match config.database_url.as_deref() {
            Some(url) => connect_store(url).await?,
            None => {
                info!("No database_url configured, using the in-memory store");
                Arc::new(InMemoryLedgerStore::new()) as Arc<dyn LedgerStore>
            }
        };

        let cache = match config.redis_url.as_deref() {
            Some(url) => connect_cache(url).await,
            None => Arc::new(InMemoryCache::new()) as Arc<dyn ViewCache>,
        };

        Ok(Backends { store, cache })
    }
}

#[cfg(feature = "postgres")]
async fn connect_store(url: &str) -> Result<Arc<dyn LedgerStore>, LedgerError> {
    let store = crate::store::PgLedgerStore::connect(url, MAX_CONNECTIONS).await?;
    store.apply_schema().await?;
    info!("Connected to Postgres store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_store(_url: &str) -> Result<Arc<dyn LedgerStore>, LedgerError> {
    Err(LedgerError::store_rejected(
        "connect store",
        "database_url is set but the postgres feature is not enabled",
    ))
}

#[cfg(feature = "redis")]
async fn connect_cache(url: &str) -> Arc<dyn ViewCache> {
    match crate::store::RedisCache::connect(url).await {
        Ok(cache) => {
            info!("Connected to Redis cache");
            Arc::new(cache)
        }
        Err(error) => {
            warn!(error = %error, "Redis unreachable, using the in-memory cache");
            Arc::new(InMemoryCache::new())
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_cache(_url: &str) -> Arc<dyn ViewCache> {
    warn!("redis_url is set but the redis feature is not enabled, using the in-memory cache");
    Arc::new(InMemoryCache::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_to_in_memory_backends() {
        let backends = Backends::from_config(&LedgerConfig::default()).await.unwrap();

        assert_eq!(backends.store.wallet(1).await.unwrap(), None);
        assert_eq!(backends.cache.get("wallet-balance-1").await.unwrap(), None);
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_database_url_needs_postgres_feature() {
        let config = LedgerConfig::default()
            .with_backends(Some("postgres://localhost/wallet".to_string()), None);

        let err = Backends::from_config(&config).await.err().unwrap();

        assert!(!err.is_retryable());
        assert!(err.to_string().contains("postgres feature"));
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_redis_url_without_feature_falls_back() {
        let config = LedgerConfig::default()
            .with_backends(None, Some("redis://127.0.0.1/".to_string()));

        let backends = Backends::from_config(&config).await.unwrap();

        backends
            .cache
            .set("wallet-balance-1", "5".to_string(), config.cache_ttl)
            .await
            .unwrap();
        assert_eq!(
            backends.cache.get("wallet-balance-1").await.unwrap().as_deref(),
            Some("5")
        );
    }
}
