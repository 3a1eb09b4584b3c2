/// In-process cache with TTL and LRU eviction
///
/// Thread-safe; the always-available fallback tier. Each entry carries the
/// TTL it was inserted with (`None` = no expiry). Tracks hit/miss metrics
/// for monitoring.

use super::CacheKey;
use crate::prices::types::PriceResult;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Cache entry with TTL tracking
struct CacheEntry {
    value: PriceResult,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
}

struct CacheState {
    data: HashMap<CacheKey, CacheEntry>,
    access_order: VecDeque<CacheKey>, // For LRU tracking
    metrics: MemoryCacheMetrics,
}

pub struct MemoryCache {
    capacity: usize,
    state: RwLock<CacheState>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(CacheState {
                data: HashMap::new(),
                access_order: VecDeque::new(),
                metrics: MemoryCacheMetrics::default(),
            }),
        }
    }

    /// Get value from cache (returns None if expired or missing)
    pub fn get(&self, key: &CacheKey) -> Option<PriceResult> {
        let mut state = self.state.write();

        let expired = match state.data.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(_) => false,
            None => {
                state.metrics.misses += 1;
                return None;
            }
        };

        if expired {
            state.data.remove(key);
            state.access_order.retain(|k| k != key);
            state.metrics.misses += 1;
            state.metrics.expirations += 1;
            return None;
        }

        // Valid entry: refresh LRU position and return
        state.access_order.retain(|k| k != key);
        state.access_order.push_back(key.clone());
        state.metrics.hits += 1;
        state.data.get(key).map(|e| e.value.clone())
    }

    /// Insert value with a per-entry TTL (evicts LRU at capacity)
    pub fn insert(&self, key: CacheKey, value: PriceResult, ttl: Option<Duration>) {
        let mut state = self.state.write();

        if state.data.len() >= self.capacity && !state.data.contains_key(&key) {
            if let Some(lru_key) = state.access_order.pop_front() {
                state.data.remove(&lru_key);
                state.metrics.evictions += 1;
            }
        }

        state.data.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        state.access_order.retain(|k| k != &key);
        state.access_order.push_back(key);
        state.metrics.inserts += 1;
    }

    pub fn metrics(&self) -> MemoryCacheMetrics {
        self.state.read().metrics.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn key(mint: &str) -> CacheKey {
        CacheKey::new(mint, Utc::now())
    }

    fn price(mint: &str, value: f64) -> PriceResult {
        PriceResult {
            mint: mint.to_string(),
            value_usd: Some(value),
            price_usd: Some(value / 1000.0),
            confidence: crate::prices::types::Confidence::High,
            source: "amm".to_string(),
            supply: Some(1000.0),
            tvl_usd: Some(50_000.0),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_basic_operations() {
        let cache = MemoryCache::new(100);

        cache.insert(key("mint1"), price("mint1", 42.0), None);
        assert_eq!(cache.get(&key("mint1")).unwrap().value_usd, Some(42.0));
        assert!(cache.get(&key("missing")).is_none());

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = MemoryCache::new(100);
        cache.insert(key("mint1"), price("mint1", 1.0), Some(Duration::ZERO));

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("mint1")).is_none());
        assert_eq!(cache.metrics().expirations, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryCache::new(2);

        cache.insert(key("mint1"), price("mint1", 1.0), None);
        cache.insert(key("mint2"), price("mint2", 2.0), None);
        cache.insert(key("mint3"), price("mint3", 3.0), None); // Evicts mint1

        assert!(cache.get(&key("mint1")).is_none());
        assert!(cache.get(&key("mint2")).is_some());
        assert!(cache.get(&key("mint3")).is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let cache = MemoryCache::new(10);
        cache.insert(key("mint1"), price("mint1", 1.0), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("mint1")).is_some());
    }
}
