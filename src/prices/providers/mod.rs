//! Off-chain price providers
//!
//! Every fallback source implements [`PriceProvider`]; the cascade is just
//! an ordered list of implementations tried until one answers. Providers
//! degrade to `None` on 404s and network trouble, never raise.

pub mod dexscreener;
pub mod geckoterminal;
pub mod jupiter;

pub use dexscreener::DexScreenerProvider;
pub use geckoterminal::GeckoTerminalProvider;
pub use jupiter::JupiterProvider;

use crate::prices::types::PriceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve price and market cap for a mint. `quote` is advisory (all
    /// providers quote in USD); `at` stamps the result for historical
    /// lookups served out of today's data.
    async fn get(
        &self,
        mint: &str,
        quote: &str,
        at: Option<DateTime<Utc>>,
    ) -> Option<PriceResult>;
}

/// Shared result construction for the fallback providers
pub(crate) fn fallback_result(
    mint: &str,
    source: &str,
    price_usd: Option<f64>,
    value_usd: Option<f64>,
    supply: Option<f64>,
    at: Option<DateTime<Utc>>,
) -> Option<PriceResult> {
    if price_usd.is_none() && value_usd.is_none() {
        return None;
    }

    Some(PriceResult {
        mint: mint.to_string(),
        value_usd,
        price_usd,
        confidence: crate::prices::types::Confidence::Est,
        source: source.to_string(),
        supply,
        tvl_usd: None,
        timestamp: at.unwrap_or_else(Utc::now),
    })
}
