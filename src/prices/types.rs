/// Price resolution result types
///
/// A `PriceResult` is immutable once constructed: whichever source answered
/// stamps its confidence tier and supporting evidence, and the cache stores
/// the snapshot as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse trust label attached to any derived price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// On-chain AMM with sufficient liquidity
    High,
    /// Any off-chain fallback
    Est,
    /// Every source failed; "no opinion", never zero
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceResult {
    pub mint: String,
    /// Market capitalization in USD
    pub value_usd: Option<f64>,
    /// Unit price in USD
    pub price_usd: Option<f64>,
    pub confidence: Confidence,
    /// Which source answered (e.g. "amm", "amm:low", "dexscreener")
    pub source: String,
    /// Supply used when the value was derived as price x supply
    pub supply: Option<f64>,
    /// TVL of the winning pool for on-chain results
    pub tvl_usd: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PriceResult {
    /// The "no opinion" result returned when every source failed
    pub fn unavailable(mint: &str) -> Self {
        Self {
            mint: mint.to_string(),
            value_usd: None,
            price_usd: None,
            confidence: Confidence::Unavailable,
            source: "none".to_string(),
            supply: None,
            tvl_usd: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.confidence != Confidence::Unavailable
    }
}
