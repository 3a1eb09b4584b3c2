//! Two-tier price/market-cap cache
//!
//! Keyed by `(mint, calendar day)` - daily granularity is deliberate:
//! historical market caps do not need minute precision and the coarse
//! bucket bounds cache cardinality.
//!
//! - [`memory`] - bounded in-process LRU, the always-available fallback
//! - [`durable`] - sqlite-backed shared tier with a 30-day TTL
//! - [`tiered`] - "try durable, else memory" decorator; callers never see
//!   a durable-tier failure

pub mod durable;
pub mod memory;
pub mod tiered;

pub use memory::MemoryCache;
pub use durable::DurableCache;
pub use tiered::{CacheStats, TieredCache};

use chrono::{DateTime, NaiveDate, Utc};

/// Cache key: mint plus the calendar day the timestamp falls in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mint: String,
    pub day: NaiveDate,
}

impl CacheKey {
    pub fn new(mint: &str, at: DateTime<Utc>) -> Self {
        Self {
            mint: mint.to_string(),
            day: at.date_naive(),
        }
    }

    /// Stable string form used by the durable tier
    pub fn as_storage_key(&self) -> String {
        format!("{}:{}", self.mint, self.day.format("%Y-%m-%d"))
    }
}
