//! Redis-backed view cache

use crate::core::traits::ViewCache;
use crate::types::CacheError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// [`ViewCache`] on a shared Redis connection
///
/// The connection manager reconnects on its own; commands issued while the
/// server is unreachable fail with [`CacheError::Backend`].
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1/`)
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::backend(url, e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::backend(url, e.to_string()))?;
        Ok(RedisCache { connection })
    }
}

#[async_trait]
impl ViewCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::backend(key, e.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| CacheError::backend(key, e.to_string()))
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::backend(key, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running Redis server at REDIS_URL"]
    async fn test_roundtrip_against_live_server() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let cache = RedisCache::connect(&url).await.unwrap();

        cache
            .set("wallet-test-balance-1", "42".to_string(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            cache.get("wallet-test-balance-1").await.unwrap().as_deref(),
            Some("42")
        );

        cache.invalidate("wallet-test-balance-1").await.unwrap();
        assert_eq!(cache.get("wallet-test-balance-1").await.unwrap(), None);
    }
}
