/// Unrealized P&L for open positions
///
/// Each open position is valued at a current price from the resolution
/// cascade (or a caller-provided override). Price trust degrades with age:
/// a high-confidence price older than 60 seconds is only an estimate, and
/// anything older than 300 seconds is stale regardless of where it came
/// from.

use crate::constants::{PRICE_FRESH_SECONDS, PRICE_STALE_SECONDS};
use crate::pnl::fifo::Position;
use crate::prices::types::{Confidence, PriceResult};
use crate::prices::PriceResolver;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Price trust after staleness degradation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessTier {
    High,
    Est,
    Stale,
    Unavailable,
}

/// Degrade a price's confidence by its age
pub fn degrade_by_age(confidence: Confidence, age_seconds: i64) -> FreshnessTier {
    match confidence {
        Confidence::Unavailable => FreshnessTier::Unavailable,
        _ if age_seconds > PRICE_STALE_SECONDS => FreshnessTier::Stale,
        Confidence::High if age_seconds > PRICE_FRESH_SECONDS => FreshnessTier::Est,
        Confidence::High => FreshnessTier::High,
        Confidence::Est => FreshnessTier::Est,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnrealizedPnl {
    pub mint: String,
    pub symbol: String,
    pub balance: f64,
    pub cost_basis_usd: f64,
    pub current_price_usd: Option<f64>,
    pub current_value_usd: Option<f64>,
    pub unrealized_pnl_usd: Option<f64>,
    pub unrealized_pnl_pct: Option<f64>,
    pub freshness: FreshnessTier,
    pub price_source: String,
}

/// Value one open position against a price result
pub fn value_position(position: &Position, price: &PriceResult) -> UnrealizedPnl {
    let age_seconds = (Utc::now() - price.timestamp).num_seconds();
    let freshness = degrade_by_age(price.confidence, age_seconds);

    let current_price = price.price_usd.filter(|p| p.is_finite() && *p > 0.0);
    let current_value = current_price.map(|p| position.balance * p);
    let unrealized = current_value.map(|v| v - position.cost_basis_usd);

    let pct = unrealized.map(|pnl| {
        if position.cost_basis_usd > 0.0 {
            pnl / position.cost_basis_usd * 100.0
        } else if current_value.unwrap_or(0.0) > 0.0 {
            // Zero-cost holdings (e.g. an airdrop) read as +100%
            100.0
        } else {
            0.0
        }
    });

    UnrealizedPnl {
        mint: position.mint.clone(),
        symbol: position.symbol.clone(),
        balance: position.balance,
        cost_basis_usd: position.cost_basis_usd,
        current_price_usd: current_price,
        current_value_usd: current_value,
        unrealized_pnl_usd: unrealized,
        unrealized_pnl_pct: pct,
        freshness,
        price_source: price.source.clone(),
    }
}

/// Compute unrealized P&L for all open positions. `overrides` supplies
/// caller-provided prices (keyed by mint) that bypass the cascade.
pub async fn compute_unrealized(
    positions: &[&Position],
    resolver: &PriceResolver,
    overrides: &HashMap<String, f64>,
) -> Vec<UnrealizedPnl> {
    let mut results = Vec::with_capacity(positions.len());

    for position in positions {
        let price = match overrides.get(&position.mint) {
            Some(override_price) => PriceResult {
                mint: position.mint.clone(),
                value_usd: None,
                price_usd: Some(*override_price),
                confidence: Confidence::High,
                source: "override".to_string(),
                supply: None,
                tvl_usd: None,
                timestamp: Utc::now(),
            },
            None => resolver.resolve(&position.mint, None, None).await,
        };

        results.push(value_position(position, &price));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn position(balance: f64, cost_usd: f64) -> Position {
        let mut p = serde_json::from_value::<Position>(serde_json::json!({
            "mint": "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "symbol": "MintA..AAAA",
            "balance": balance,
            "cost_basis_usd": cost_usd,
            "cost_basis_native": 0.0,
            "cost_basis_method": "fifo",
            "open": true,
            "trade_count": 1,
            "last_slot": 1,
            "last_update": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        p.balance = balance;
        p
    }

    fn price_at_age(confidence: Confidence, age_seconds: i64, price: f64) -> PriceResult {
        PriceResult {
            mint: "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            value_usd: None,
            price_usd: Some(price),
            confidence,
            source: "amm".to_string(),
            supply: None,
            tvl_usd: None,
            timestamp: Utc::now() - Duration::seconds(age_seconds),
        }
    }

    #[test]
    fn test_unrealized_math() {
        let p = position(1000.0, 400.0);
        let result = value_position(&p, &price_at_age(Confidence::High, 0, 0.5));

        assert_eq!(result.current_value_usd, Some(500.0));
        assert_eq!(result.unrealized_pnl_usd, Some(100.0));
        assert!((result.unrealized_pnl_pct.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(result.freshness, FreshnessTier::High);
    }

    #[test]
    fn test_airdrop_zero_basis_is_hundred_percent() {
        let p = position(1000.0, 0.0);
        let result = value_position(&p, &price_at_age(Confidence::High, 0, 0.5));
        assert_eq!(result.unrealized_pnl_pct, Some(100.0));
    }

    #[test]
    fn test_staleness_degradation() {
        assert_eq!(degrade_by_age(Confidence::High, 10), FreshnessTier::High);
        assert_eq!(degrade_by_age(Confidence::High, 61), FreshnessTier::Est);
        assert_eq!(degrade_by_age(Confidence::High, 301), FreshnessTier::Stale);
        assert_eq!(degrade_by_age(Confidence::Est, 10), FreshnessTier::Est);
        assert_eq!(degrade_by_age(Confidence::Est, 301), FreshnessTier::Stale);
        assert_eq!(degrade_by_age(Confidence::Unavailable, 0), FreshnessTier::Unavailable);
    }

    #[test]
    fn test_unavailable_price_has_no_value() {
        let p = position(1000.0, 400.0);
        let unavailable = PriceResult::unavailable(&p.mint);
        let result = value_position(&p, &unavailable);

        assert_eq!(result.current_value_usd, None);
        assert_eq!(result.unrealized_pnl_usd, None);
        assert_eq!(result.freshness, FreshnessTier::Unavailable);
    }
}
