/// DexScreener market data provider
///
/// Uses the /tokens/v1 endpoint which returns ONE best pool per token
/// (DexScreener picks the most liquid). Direct market cap is preferred;
/// when absent the cap is derived as price x independently fetched supply.

use super::{fallback_result, PriceProvider};
use crate::logger::{self, LogTag};
use crate::prices::supply::SupplyResolver;
use crate::prices::types::PriceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com/tokens/v1/solana";

#[derive(Debug, Deserialize)]
struct DexScreenerPool {
    #[serde(rename = "priceUsd", default)]
    price_usd: Option<String>,
    #[serde(rename = "marketCap", default)]
    market_cap: Option<f64>,
    #[serde(default)]
    fdv: Option<f64>,
}

pub struct DexScreenerProvider {
    client: reqwest::Client,
    supply: Arc<SupplyResolver>,
}

impl DexScreenerProvider {
    pub fn new(timeout: Duration, supply: Arc<SupplyResolver>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client, supply }
    }

    async fn fetch_best_pool(&self, mint: &str) -> Option<DexScreenerPool> {
        let url = format!("{}/{}", DEXSCREENER_BASE_URL, mint);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                logger::debug(LogTag::Prices, &format!("DexScreener request failed: {}", e));
                return None;
            }
        };

        if response.status().as_u16() == 404 {
            return None;
        }
        if !response.status().is_success() {
            logger::debug(
                LogTag::Prices,
                &format!("DexScreener HTTP {} for {}", response.status(), mint),
            );
            return None;
        }

        let mut pools: Vec<DexScreenerPool> = match response.json().await {
            Ok(pools) => pools,
            Err(e) => {
                logger::debug(LogTag::Prices, &format!("DexScreener parse failed: {}", e));
                return None;
            }
        };

        if pools.is_empty() {
            None
        } else {
            // Batch endpoint returns the best pool first
            Some(pools.remove(0))
        }
    }
}

#[async_trait]
impl PriceProvider for DexScreenerProvider {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn get(
        &self,
        mint: &str,
        _quote: &str,
        at: Option<DateTime<Utc>>,
    ) -> Option<PriceResult> {
        let pool = self.fetch_best_pool(mint).await?;

        let price_usd = pool
            .price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0);

        // Direct market cap branch, fdv accepted as the cap for fully
        // circulating tokens
        let direct_cap = pool.market_cap.or(pool.fdv).filter(|c| *c > 0.0);
        if direct_cap.is_some() {
            return fallback_result(mint, self.name(), price_usd, direct_cap, None, at);
        }

        // Price x supply branch
        let price = price_usd?;
        let supply = self.supply.get(mint).await;
        let value_usd = supply.map(|s| price * s.supply);

        fallback_result(
            mint,
            self.name(),
            Some(price),
            value_usd,
            supply.map(|s| s.supply),
            at,
        )
    }
}
