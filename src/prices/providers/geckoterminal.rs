/// GeckoTerminal market data provider
///
/// Single token endpoint; market_cap_usd is frequently null for long-tail
/// tokens, in which case the cap falls back to price x supply.

use super::{fallback_result, PriceProvider};
use crate::logger::{self, LogTag};
use crate::prices::supply::SupplyResolver;
use crate::prices::types::PriceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const GECKOTERMINAL_BASE_URL: &str = "https://api.geckoterminal.com/api/v2/networks/solana/tokens";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    attributes: TokenAttributes,
}

#[derive(Debug, Deserialize)]
struct TokenAttributes {
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    market_cap_usd: Option<String>,
    #[serde(default)]
    fdv_usd: Option<String>,
}

pub struct GeckoTerminalProvider {
    client: reqwest::Client,
    supply: Arc<SupplyResolver>,
}

impl GeckoTerminalProvider {
    pub fn new(timeout: Duration, supply: Arc<SupplyResolver>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client, supply }
    }

    async fn fetch_attributes(&self, mint: &str) -> Option<TokenAttributes> {
        let url = format!("{}/{}", GECKOTERMINAL_BASE_URL, mint);

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                logger::debug(LogTag::Prices, &format!("GeckoTerminal request failed: {}", e));
                return None;
            }
        };

        if response.status().as_u16() == 404 {
            return None;
        }
        if !response.status().is_success() {
            logger::debug(
                LogTag::Prices,
                &format!("GeckoTerminal HTTP {} for {}", response.status(), mint),
            );
            return None;
        }

        let parsed: TokenResponse = response.json().await.ok()?;
        Some(parsed.data.attributes)
    }
}

fn parse_positive(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[async_trait]
impl PriceProvider for GeckoTerminalProvider {
    fn name(&self) -> &'static str {
        "geckoterminal"
    }

    async fn get(
        &self,
        mint: &str,
        _quote: &str,
        at: Option<DateTime<Utc>>,
    ) -> Option<PriceResult> {
        let attributes = self.fetch_attributes(mint).await?;

        let price_usd = parse_positive(&attributes.price_usd);

        let direct_cap = parse_positive(&attributes.market_cap_usd)
            .or_else(|| parse_positive(&attributes.fdv_usd));
        if direct_cap.is_some() {
            return fallback_result(mint, self.name(), price_usd, direct_cap, None, at);
        }

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
