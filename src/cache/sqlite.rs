use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::task;

use super::types::{CacheBackend, CacheEntry, CacheKey};
use crate::assessment::SourceResult;

/// SQLite-based cache implementation
pub struct SqliteCache {
    db_path: std::path::PathBuf,
}

impl SqliteCache {
    /// Create a new SQLite cache
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create cache directory")?;
        }

        let cache = Self { db_path };
        cache.initialize_db().await?;
        Ok(cache)
    }

    /// Initialize the database schema
    async fn initialize_db(&self) -> Result<()> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;

            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS assessment_cache (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    cache_key TEXT UNIQUE NOT NULL,
                    address TEXT NOT NULL,
                    sources TEXT NOT NULL,
                    options_hash TEXT NOT NULL,
                    results TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                [],
            )
            .context("Failed to create cache table")?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_cache_key ON assessment_cache(cache_key)",
                [],
            )
            .context("Failed to create cache key index")?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_address ON assessment_cache(address)",
                [],
            )
            .context("Failed to create address index")?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_timestamp ON assessment_cache(timestamp)",
                [],
            )
            .context("Failed to create timestamp index")?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Execute a database operation in a blocking task
    async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let cache_key = key.to_string();

        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare("SELECT results, timestamp FROM assessment_cache WHERE cache_key = ?1")?;

            let result = stmt
                .query_row(params![cache_key], |row| {
                    let results_json: String = row.get(0)?;
                    let timestamp_str: String = row.get(1)?;

                    let results: Vec<SourceResult> = serde_json::from_str(&results_json)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                0,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;

                    let timestamp: DateTime<Utc> = timestamp_str.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;

                    Ok(CacheEntry { results, timestamp })
                })
                .optional()?;

            Ok(result)
        })
        .await
    }

    async fn set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let cache_key = key.to_string();
        let address = key.address.clone();
        let sources = serde_json::to_string(&key.sources)?;
        let options_hash = key.options_hash.clone();
        let results = serde_json::to_string(&entry.results)?;
        let timestamp = entry.timestamp.to_rfc3339();

        self.with_connection(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO assessment_cache
                (cache_key, address, sources, options_hash, results, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![cache_key, address, sources, options_hash, results, timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        let cache_key = key.to_string();

        self.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM assessment_cache WHERE cache_key = ?1",
                params![cache_key],
            )?;
            Ok(())
        })
        .await
    }

    async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<()> {
        let cutoff_time = Utc::now() - chrono::Duration::seconds(ttl_seconds as i64);
        let cutoff_str = cutoff_time.to_rfc3339();

        self.with_connection(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM assessment_cache WHERE timestamp < ?1",
                params![cutoff_str],
            )?;

            // Also vacuum the database if we deleted a significant number of entries
            if deleted > 10 {
                conn.execute("VACUUM", [])?;
            }

            Ok(())
        })
        .await
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        let cache_key = key.to_string();

        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM assessment_cache WHERE cache_key = ?1",
                params![cache_key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{Location, SourcePayload};
    use crate::cache::types::CacheOptions;
    use tempfile::tempdir;

    fn sample_results() -> Vec<SourceResult> {
        vec![SourceResult::success(
            "postcode",
            SourcePayload::Location(Location {
                postcode: Some("SW1A 2AA".to_string()),
                latitude: 51.5034,
                longitude: -0.1276,
                admin_district: Some("Westminster".to_string()),
                ward: None,
                region: None,
            }),
        )]
    }

    fn sample_key(address: &str) -> CacheKey {
        let options = CacheOptions {
            radius_m: 1000,
            floorplan_url: None,
        };
        CacheKey::new(address, &["postcode".to_string()], &options)
    }

    #[tokio::test]
    async fn test_sqlite_cache_basic_operations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let cache = SqliteCache::new(&db_path).await?;
        let key = sample_key("SW1A 2AA");
        let entry = CacheEntry::new(sample_results());

        assert!(!cache.exists(&key).await?);

        cache.set(&key, &entry).await?;
        assert!(cache.exists(&key).await?);

        let retrieved = cache.get(&key).await?.expect("entry should be present");
        assert_eq!(retrieved.results.len(), 1);
        assert_eq!(retrieved.results[0].source, "postcode");

        cache.delete(&key).await?;
        assert!(!cache.exists(&key).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_cache_cleanup_expired() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let cache = SqliteCache::new(&db_path).await?;
        let key = sample_key("SW1A 2AA");

        let mut old_entry = CacheEntry::new(sample_results());
        old_entry.timestamp = Utc::now() - chrono::Duration::hours(2);

        cache.set(&key, &old_entry).await?;
        assert!(cache.exists(&key).await?);

        cache.cleanup_expired(3600).await?;
        assert!(!cache.exists(&key).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_cache_multiple_entries() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let cache = SqliteCache::new(&db_path).await?;

        let key1 = sample_key("SW1A 2AA");
        let key2 = sample_key("M1 1AE");
        let entry = CacheEntry::new(sample_results());

        cache.set(&key1, &entry).await?;
        cache.set(&key2, &entry).await?;

        assert!(cache.exists(&key1).await?);
        assert!(cache.exists(&key2).await?);

        Ok(())
    }
}
