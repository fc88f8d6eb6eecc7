//! In-memory view cache with per-key expiry

use crate::core::traits::ViewCache;
use crate::types::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Process-local [`ViewCache`]
///
/// Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CachedValue>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ViewCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match hit {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, cached| !cached.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CachedValue {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = InMemoryCache::new();

        cache
            .set("wallet-balance-1", "100".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get("wallet-balance-1").await.unwrap().as_deref(),
            Some("100")
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped() {
        let cache = InMemoryCache::new();

        cache
            .set("wallet-balance-1", "100".to_string(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get("wallet-balance-1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_ttl_never_expires() {
        let cache = InMemoryCache::new();

        cache
            .set("wallet-balance-1", "100".to_string(), Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        assert_eq!(
            cache.get("wallet-balance-1").await.unwrap().as_deref(),
            Some("100")
        );
        cache.invalidate("wallet-balance-1").await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_missing_key_is_ok() {
        let cache = InMemoryCache::new();

        assert!(cache.invalidate("wallet-balance-1").await.is_ok());
    }
}
