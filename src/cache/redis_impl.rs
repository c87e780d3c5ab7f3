use anyhow::{Context, Result};
use async_trait::async_trait;

use super::types::{CacheBackend, CacheEntry, CacheKey};

/// Redis-based cache implementation
/// This is only available when the "redis-cache" feature is enabled
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Create a new Redis cache
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        // Test the connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .context("Redis ping failed")?;

        Ok(Self { client })
    }

    /// Generate a Redis key from a cache key
    fn redis_key(&self, key: &CacheKey) -> String {
        format!("propscan:cache:{}", key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        let redis_key = self.redis_key(key);
        let value: Option<String> = redis::cmd("GET")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .context("Failed to get value from Redis")?;

        match value {
            Some(json_str) => {
                let entry: CacheEntry =
                    serde_json::from_str(&json_str).context("Failed to deserialize cache entry")?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        let redis_key = self.redis_key(key);
        let json_str = serde_json::to_string(entry).context("Failed to serialize cache entry")?;

        redis::cmd("SET")
            .arg(&redis_key)
            .arg(&json_str)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        let redis_key = self.redis_key(key);

        redis::cmd("DEL")
            .arg(&redis_key)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to delete value from Redis")?;

        Ok(())
    }

    async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<()> {
        // Entries carry their own timestamp and expiry is enforced on read;
        // scanning the whole keyspace here would not be worth it
        let _ = ttl_seconds;
        Ok(())
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        let redis_key = self.redis_key(key);
        let exists: bool = redis::cmd("EXISTS")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await
            .context("Failed to check key existence in Redis")?;

        Ok(exists)
    }
}
