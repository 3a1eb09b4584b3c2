/// Jupiter aggregator price provider
///
/// Primary path is the price endpoint; when the aggregator has no direct
/// quote for a mint (common for illiquid tokens) the swap-quote endpoint
/// is used for price discovery: quote one whole token into USDC and read
/// the out-amount. Market cap is always derived as price x supply.

use super::{fallback_result, PriceProvider};
use crate::constants::USDC_MINT;
use crate::logger::{self, LogTag};
use crate::prices::supply::SupplyResolver;
use crate::prices::types::PriceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const JUPITER_PRICE_URL: &str = "https://lite-api.jup.ag/price/v2";
const JUPITER_QUOTE_URL: &str = "https://lite-api.jup.ag/swap/v1/quote";

/// USDC has six decimals; quote out-amounts are raw USDC units
const USDC_DECIMALS: i32 = 6;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    price: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: String,
}

pub struct JupiterProvider {
    client: reqwest::Client,
    supply: Arc<SupplyResolver>,
}

impl JupiterProvider {
    pub fn new(timeout: Duration, supply: Arc<SupplyResolver>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client, supply }
    }

    async fn fetch_direct_price(&self, mint: &str) -> Option<f64> {
        let url = format!("{}?ids={}", JUPITER_PRICE_URL, mint);

        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }

        let parsed: PriceResponse = response.json().await.ok()?;
        parsed
            .data
            .get(mint)
            .and_then(|entry| entry.as_ref())
            .and_then(|entry| entry.price.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Price discovery through the swap router: how much USDC does one
    /// whole token fetch right now
    async fn fetch_quote_price(&self, mint: &str, decimals: u8) -> Option<f64> {
        let amount_in = 10u64.checked_pow(decimals as u32)?;
        let url = format!(
            "{}?inputMint={}&outputMint={}&amount={}&slippageBps=50",
            JUPITER_QUOTE_URL, mint, USDC_MINT, amount_in
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                logger::debug(LogTag::Prices, &format!("Jupiter quote failed: {}", e));
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        let quote: QuoteResponse = response.json().await.ok()?;
        let out_raw = quote.out_amount.parse::<f64>().ok()?;
        let price = out_raw / 10f64.powi(USDC_DECIMALS);

        (price.is_finite() && price > 0.0).then_some(price)
    }
}

#[async_trait]
impl PriceProvider for JupiterProvider {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn get(
        &self,
        mint: &str,
        _quote: &str,
        at: Option<DateTime<Utc>>,
    ) -> Option<PriceResult> {
        // Supply first: it powers both the cap and the quote fallback
        let supply = self.supply.get(mint).await;

        let price = match self.fetch_direct_price(mint).await {
            Some(price) => Some(price),
            None => match supply {
                Some(info) => self.fetch_quote_price(mint, info.decimals).await,
                None => None,
            },
        }?;

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
