use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::assessment::{PropertyQuery, SourceResult};

/// Cache key that uniquely identifies one aggregation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub address: String,
    pub sources: Vec<String>,
    pub options_hash: String,
}

impl CacheKey {
    /// Create a new cache key from the query and the active source set
    pub fn new(address: &str, sources: &[String], options: &CacheOptions) -> Self {
        let mut sources = sources.to_vec();
        sources.sort(); // Ensure consistent ordering

        Self {
            address: address.to_string(),
            sources,
            options_hash: options.compute_hash(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut hasher = Sha256::new();
        hasher.update(&self.address);
        hasher.update(self.sources.join(","));
        hasher.update(&self.options_hash);
        write!(f, "{:x}", hasher.finalize())
    }
}

/// The query options that change what the sources return.
///
/// Purchase price and buyer flags deliberately stay out: they only affect
/// scoring, so a cached fetch can serve a re-run with different financials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheOptions {
    pub radius_m: u32,
    pub floorplan_url: Option<String>,
}

impl CacheOptions {
    pub fn from_query(query: &PropertyQuery) -> Self {
        Self {
            radius_m: query.radius_m,
            floorplan_url: query.floorplan_url.clone(),
        }
    }

    /// Compute a hash of the fetch-relevant options
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.radius_m.to_string());
        hasher.update(self.floorplan_url.clone().unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }
}

/// Cache entry containing the per-source results of one aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub results: Vec<SourceResult>,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(results: Vec<SourceResult>) -> Self {
        Self {
            results,
            timestamp: Utc::now(),
        }
    }

    /// Check if the cache entry is expired
    pub fn is_expired(&self, ttl_seconds: u64) -> bool {
        let now = Utc::now();
        let elapsed = now.signed_duration_since(self.timestamp).num_seconds() as u64;
        elapsed >= ttl_seconds
    }
}

/// Trait defining the interface for cache backends
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a cache entry by key
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Set a cache entry
    async fn set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()>;

    /// Delete a cache entry
    async fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Clean up expired entries
    async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<()>;

    /// Check if a key exists in the cache
    async fn exists(&self, key: &CacheKey) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{Location, SourcePayload};

    fn options(radius: u32) -> CacheOptions {
        CacheOptions {
            radius_m: radius,
            floorplan_url: None,
        }
    }

    #[test]
    fn test_cache_key_sources_sorted() {
        let key = CacheKey::new(
            "SW1A 2AA",
            &[
                "rates".to_string(),
                "crime".to_string(),
                "postcode".to_string(),
            ],
            &options(1000),
        );

        assert_eq!(key.sources, vec!["crime", "postcode", "rates"]);
    }

    #[test]
    fn test_cache_key_display_is_stable() {
        let key1 = CacheKey::new("SW1A 2AA", &["crime".to_string()], &options(1000));
        let key2 = CacheKey::new("SW1A 2AA", &["crime".to_string()], &options(1000));
        let key3 = CacheKey::new("M1 1AE", &["crime".to_string()], &options(1000));

        assert_eq!(format!("{}", key1), format!("{}", key2));
        assert_ne!(format!("{}", key1), format!("{}", key3));
    }

    #[test]
    fn test_options_hash_changes_with_radius() {
        assert_ne!(
            options(1000).compute_hash(),
            options(500).compute_hash()
        );
    }

    #[test]
    fn test_options_hash_changes_with_floorplan() {
        let with_plan = CacheOptions {
            radius_m: 1000,
            floorplan_url: Some("https://listings.example/plan.png".to_string()),
        };
        assert_ne!(options(1000).compute_hash(), with_plan.compute_hash());
    }

    #[test]
    fn test_cache_entry_expiry() {
        let mut entry = CacheEntry::new(vec![SourceResult::success(
            "postcode",
            SourcePayload::Location(Location {
                postcode: Some("SW1A 2AA".to_string()),
                latitude: 51.5,
                longitude: -0.12,
                admin_district: None,
                ward: None,
                region: None,
            }),
        )]);

        assert!(!entry.is_expired(3600));

        entry.timestamp = Utc::now() - chrono::Duration::hours(2);
        assert!(entry.is_expired(3600));
    }

    #[test]
    fn test_cache_entry_is_expired_boundary() {
        let mut entry = CacheEntry::new(vec![]);

        entry.timestamp = Utc::now() - chrono::Duration::seconds(3600);
        assert!(entry.is_expired(3600));

        entry.timestamp = Utc::now() - chrono::Duration::seconds(3599);
        assert!(!entry.is_expired(3600));
    }
}
