/// Two-tier cache decorator: durable primary, in-process fallback
///
/// Pipeline code talks to this type only and stays oblivious to which tier
/// answered. A durable-tier failure is logged once per operation and the
/// call transparently degrades to the memory tier; callers never see it.

use super::{CacheKey, DurableCache, MemoryCache};
use crate::logger::{self, LogTag};
use crate::prices::types::PriceResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Aggregate statistics over both tiers
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub durable_hits: u64,
    pub durable_misses: u64,
    pub durable_errors: u64,
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_entries: usize,
    pub durable_entries: Option<usize>,
}

#[derive(Default)]
struct TierCounters {
    durable_hits: u64,
    durable_misses: u64,
    durable_errors: u64,
    memory_hits: u64,
    memory_misses: u64,
}

pub struct TieredCache {
    memory: MemoryCache,
    durable: Option<DurableCache>,
    /// TTL applied to memory-tier inserts, mirroring the durable TTL
    memory_ttl: Option<Duration>,
    counters: Mutex<TierCounters>,
}

impl TieredCache {
    /// Build the two-tier cache. A durable tier that fails to open is
    /// reported and the cache runs memory-only from the start.
    pub fn new(db_path: &str, ttl_days: i64, memory_capacity: usize) -> Self {
        let durable = match DurableCache::open(db_path, ttl_days) {
            Ok(cache) => Some(cache),
            Err(e) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Durable cache unavailable ({}), running memory-only", e),
                );
                None
            }
        };

        Self {
            memory: MemoryCache::new(memory_capacity),
            durable,
            memory_ttl: Some(Duration::from_secs((ttl_days.max(0) as u64) * 86_400)),
            counters: Mutex::new(TierCounters::default()),
        }
    }

    /// Memory-only cache used by tests and keyless embedders
    pub fn memory_only(memory_capacity: usize) -> Self {
        Self {
            memory: MemoryCache::new(memory_capacity),
            durable: None,
            memory_ttl: None,
            counters: Mutex::new(TierCounters::default()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<PriceResult> {
        if let Some(durable) = &self.durable {
            match durable.get(key) {
                Ok(Some(value)) => {
                    self.counters.lock().durable_hits += 1;
                    return Some(value);
                }
                Ok(None) => {
                    self.counters.lock().durable_misses += 1;
                }
                Err(e) => {
                    self.counters.lock().durable_errors += 1;
                    logger::debug(LogTag::Cache, &format!("Durable get failed: {}", e));
                }
            }
        }

        let hit = self.memory.get(key);
        {
            let mut counters = self.counters.lock();
            if hit.is_some() {
                counters.memory_hits += 1;
            } else {
                counters.memory_misses += 1;
            }
        }
        hit
    }

    /// Batch lookup: one durable round trip, memory fills the gaps
    pub fn get_batch(&self, keys: &[CacheKey]) -> HashMap<CacheKey, PriceResult> {
        let mut results = HashMap::new();

        if let Some(durable) = &self.durable {
            match durable.get_batch(keys) {
                Ok(found) => {
                    self.counters.lock().durable_hits += found.len() as u64;
                    results = found;
                }
                Err(e) => {
                    self.counters.lock().durable_errors += 1;
                    logger::debug(LogTag::Cache, &format!("Durable batch get failed: {}", e));
                }
            }
        }

        for key in keys {
            if results.contains_key(key) {
                continue;
            }
            if let Some(value) = self.memory.get(key) {
                self.counters.lock().memory_hits += 1;
                results.insert(key.clone(), value);
            }
        }

        results
    }

    /// Write through both tiers; the memory tier always receives the entry
    /// so a dying backend cannot lose fresh results
    pub fn set(&self, key: &CacheKey, value: &PriceResult) {
        self.memory.insert(key.clone(), value.clone(), self.memory_ttl);

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.set(key, value) {
                self.counters.lock().durable_errors += 1;
                logger::debug(LogTag::Cache, &format!("Durable set failed: {}", e));
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters.lock();
        CacheStats {
            durable_hits: counters.durable_hits,
            durable_misses: counters.durable_misses,
            durable_errors: counters.durable_errors,
            memory_hits: counters.memory_hits,
            memory_misses: counters.memory_misses,
            memory_entries: self.memory.len(),
            durable_entries: self
                .durable
                .as_ref()
                .and_then(|d| d.len().ok()),
        }
    }
}
