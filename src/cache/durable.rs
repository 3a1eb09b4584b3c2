/// Durable shared cache tier backed by sqlite
///
/// Stores `PriceResult` snapshots as JSON keyed by `mint:day`, with a
/// 30-day TTL enforced at read time. Batch gets resolve in a single query.
/// Every operation returns `CacheResult`; the tiered decorator turns any
/// failure into a silent fallback to the in-process tier.

use super::CacheKey;
use crate::errors::{CacheError, CacheResult};
use crate::prices::types::PriceResult;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;

pub struct DurableCache {
    connection: Mutex<Connection>,
    ttl_days: i64,
}

impl DurableCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: &str, ttl_days: i64) -> CacheResult<Self> {
        let connection = Connection::open(path)?;

        connection.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS price_cache (
                cache_key   TEXT PRIMARY KEY,
                payload     TEXT NOT NULL,
                inserted_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_price_cache_inserted
                ON price_cache (inserted_at);",
        )?;

        Ok(Self {
            connection: Mutex::new(connection),
            ttl_days,
        })
    }

    pub fn get(&self, key: &CacheKey) -> CacheResult<Option<PriceResult>> {
        let connection = self.connection.lock();
        let mut stmt = connection
            .prepare("SELECT payload, inserted_at FROM price_cache WHERE cache_key = ?1")?;

        let row: Option<(String, i64)> = stmt
            .query_row(params![key.as_storage_key()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some((payload, inserted_at)) = row else {
            return Ok(None);
        };

        if self.is_expired(inserted_at) {
            return Ok(None);
        }

        let value: PriceResult = serde_json::from_str(&payload)?;
        Ok(Some(value))
    }

    /// Resolve many keys in one query round trip
    pub fn get_batch(&self, keys: &[CacheKey]) -> CacheResult<HashMap<CacheKey, PriceResult>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let storage_keys: Vec<String> = keys.iter().map(|k| k.as_storage_key()).collect();
        let by_storage: HashMap<&str, &CacheKey> = storage_keys
            .iter()
            .map(|s| s.as_str())
            .zip(keys.iter())
            .collect();

        let placeholders = vec!["?"; storage_keys.len()].join(",");
        let query = format!(
            "SELECT cache_key, payload, inserted_at FROM price_cache WHERE cache_key IN ({})",
            placeholders
        );

        let connection = self.connection.lock();
        let mut stmt = connection.prepare(&query)?;

        let mut results = HashMap::new();
        let rows = stmt.query_map(params_from_iter(storage_keys.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        for row in rows {
            let (storage_key, payload, inserted_at) = row?;
            if self.is_expired(inserted_at) {
                continue;
            }
            let Some(key) = by_storage.get(storage_key.as_str()) else {
                continue;
            };
            if let Ok(value) = serde_json::from_str::<PriceResult>(&payload) {
                results.insert((*key).clone(), value);
            }
        }

        Ok(results)
    }

    pub fn set(&self, key: &CacheKey, value: &PriceResult) -> CacheResult<()> {
        let payload = serde_json::to_string(value)?;
        let connection = self.connection.lock();
        connection.execute(
            "INSERT OR REPLACE INTO price_cache (cache_key, payload, inserted_at)
             VALUES (?1, ?2, ?3)",
            params![key.as_storage_key(), payload, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Delete entries past their TTL; returns how many were removed
    pub fn prune_expired(&self) -> CacheResult<usize> {
        let cutoff = Utc::now().timestamp() - self.ttl_days * 86_400;
        let connection = self.connection.lock();
        let removed = connection.execute(
            "DELETE FROM price_cache WHERE inserted_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    pub fn len(&self) -> CacheResult<usize> {
        let connection = self.connection.lock();
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM price_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn is_expired(&self, inserted_at: i64) -> bool {
        let age_secs = Utc::now().timestamp() - inserted_at;
        age_secs > self.ttl_days * 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::types::Confidence;
    use chrono::{TimeZone, Utc};

    fn temp_cache(ttl_days: i64) -> (tempfile::TempDir, DurableCache) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let cache = DurableCache::open(path.to_str().unwrap(), ttl_days).unwrap();
        (dir, cache)
    }

    fn price(mint: &str, value: f64) -> PriceResult {
        PriceResult {
            mint: mint.to_string(),
            value_usd: Some(value),
            price_usd: Some(0.5),
            confidence: Confidence::Est,
            source: "dexscreener".to_string(),
            supply: None,
            tvl_usd: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_round_trip_same_day() {
        let (_dir, cache) = temp_cache(30);
        let noon = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap();

        cache.set(&CacheKey::new("mint1", noon), &price("mint1", 123.0)).unwrap();

        // Any timestamp in the same calendar day resolves the same entry
        let hit = cache.get(&CacheKey::new("mint1", evening)).unwrap();
        assert_eq!(hit.unwrap().value_usd, Some(123.0));

        // One day later misses
        let next_day = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();
        assert!(cache.get(&CacheKey::new("mint1", next_day)).unwrap().is_none());
    }

    #[test]
    fn test_batch_get_single_round_trip() {
        let (_dir, cache) = temp_cache(30);
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

        for i in 0..5 {
            let mint = format!("mint{}", i);
            cache.set(&CacheKey::new(&mint, at), &price(&mint, i as f64)).unwrap();
        }

        let keys: Vec<CacheKey> = (0..8).map(|i| CacheKey::new(&format!("mint{}", i), at)).collect();
        let results = cache.get_batch(&keys).unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[&CacheKey::new("mint3", at)].value_usd, Some(3.0));
    }

    #[test]
    fn test_expired_entries_are_pruned() {
        let (_dir, cache) = temp_cache(0); // Everything expires immediately
        let at = Utc::now();

        cache.set(&CacheKey::new("mint1", at), &price("mint1", 1.0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(cache.get(&CacheKey::new("mint1", at)).unwrap().is_none());
        assert_eq!(cache.prune_expired().unwrap(), 1);
        assert_eq!(cache.len().unwrap(), 0);
    }
}
