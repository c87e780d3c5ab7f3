mod sqlite;
mod types;

#[cfg(feature = "redis-cache")]
mod redis_impl;

pub use sqlite::SqliteCache;
pub use types::{CacheBackend, CacheEntry, CacheKey, CacheOptions};

#[cfg(feature = "redis-cache")]
pub use redis_impl::RedisCache;

use anyhow::Result;

/// Cache manager that provides a unified interface for different cache backends
pub struct CacheManager {
    backend: Box<dyn CacheBackend>,
}

impl CacheManager {
    /// Create a new cache manager with SQLite backend
    pub async fn new_sqlite<P: AsRef<std::path::Path>>(db_path: P) -> Result<Self> {
        let backend = Box::new(SqliteCache::new(db_path).await?);
        Ok(Self { backend })
    }

    /// Create a new cache manager with Redis backend (if feature is enabled)
    #[cfg(feature = "redis-cache")]
    pub async fn new_redis(redis_url: &str) -> Result<Self> {
        let backend = Box::new(RedisCache::new(redis_url).await?);
        Ok(Self { backend })
    }

    /// Get cached source results for a query, ignoring expired entries
    pub async fn get_fresh(&self, key: &CacheKey, ttl_seconds: u64) -> Result<Option<CacheEntry>> {
        match self.backend.get(key).await? {
            Some(entry) if !entry.is_expired(ttl_seconds) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    /// Store source results in cache
    pub async fn store(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        self.backend.set(key, entry).await
    }

    /// Clear expired cache entries
    pub async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<()> {
        self.backend.cleanup_expired(ttl_seconds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{SourcePayload, SourceResult, TaxRules};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cache_manager_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let cache = CacheManager::new_sqlite(&db_path).await?;

        let options = CacheOptions {
            radius_m: 1000,
            floorplan_url: None,
        };
        let key = CacheKey::new("SW1A 2AA", &["tax".to_string()], &options);
        let entry = CacheEntry::new(vec![SourceResult::success(
            "tax",
            SourcePayload::TaxRules(TaxRules::built_in()),
        )]);

        cache.store(&key, &entry).await?;

        let fresh = cache.get_fresh(&key, 3600).await?;
        assert!(fresh.is_some());
        assert_eq!(fresh.unwrap().results[0].source, "tax");

        Ok(())
    }

    #[tokio::test]
    async fn test_cache_manager_expired_entry_is_ignored() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let cache = CacheManager::new_sqlite(&db_path).await?;

        let options = CacheOptions {
            radius_m: 1000,
            floorplan_url: None,
        };
        let key = CacheKey::new("SW1A 2AA", &["tax".to_string()], &options);

        let mut entry = CacheEntry::new(vec![SourceResult::success(
            "tax",
            SourcePayload::TaxRules(TaxRules::built_in()),
        )]);
        entry.timestamp = chrono::Utc::now() - chrono::Duration::hours(2);

        cache.store(&key, &entry).await?;

        let fresh = cache.get_fresh(&key, 3600).await?;
        assert!(fresh.is_none());

        Ok(())
    }
}
