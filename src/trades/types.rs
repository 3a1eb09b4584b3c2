/// Trade record and result envelope types
///
/// A `Trade` is the unit of output: exactly one per transaction signature,
/// created during extraction, filled in by the pricing and P&L steps, never
/// deleted. The wire shape rounds display numbers with round-half-to-even
/// so repeated runs render identically.

use crate::constants::{is_native_mint, is_stable_mint, SOL_MINT, USDC_MINT, USDT_MINT};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// TRADE
// =============================================================================

/// One side of a swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSide {
    pub mint: String,
    pub symbol: String,
    /// Decimal-adjusted ui amount
    pub amount: f64,
}

impl TokenSide {
    pub fn new(mint: &str, amount: f64) -> Self {
        Self {
            mint: mint.to_string(),
            symbol: symbol_for_mint(mint),
            amount,
        }
    }
}

/// Buy/sell classification derived from which leg carries the native token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Position linkage filled in by the P&L engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLink {
    /// Balance of the token remaining after this trade
    pub remaining_balance: f64,
    /// Cost-basis accounting method applied
    pub cost_basis_method: String,
    /// True when this trade closed the position
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub signature: String,
    pub slot: u64,
    pub timestamp: DateTime<Utc>,
    pub token_in: TokenSide,
    pub token_out: TokenSide,
    /// USD price of the non-native token, filled by the pricing step
    pub price_usd: Option<f64>,
    /// USD value of the trade, filled by the pricing step
    pub value_usd: Option<f64>,
    /// Realized P&L in USD, filled by the P&L step
    pub pnl_usd: f64,
    /// Network fee paid, in lamports
    #[serde(default)]
    pub fee_lamports: u64,
    /// Transaction fee converted to USD (zero until priced)
    pub fees_usd: f64,
    /// Venue label from the upstream indexer
    pub dex: String,
    pub tx_type: String,
    pub priced: bool,
    #[serde(default)]
    pub position: Option<PositionLink>,
}

impl Trade {
    /// Which leg is the native currency decides buy vs sell; a stable
    /// input leg also reads as a buy for token/stable venues
    pub fn action(&self) -> TradeAction {
        if is_native_mint(&self.token_in.mint) {
            TradeAction::Buy
        } else if is_native_mint(&self.token_out.mint) {
            TradeAction::Sell
        } else if is_stable_mint(&self.token_in.mint) {
            TradeAction::Buy
        } else {
            TradeAction::Sell
        }
    }

    /// The non-native leg this trade is about
    pub fn token_side(&self) -> &TokenSide {
        match self.action() {
            TradeAction::Buy => &self.token_out,
            TradeAction::Sell => &self.token_in,
        }
    }

    /// Serialize into the wire shape served to API consumers
    pub fn to_wire(&self) -> TradeWire {
        let token = self.token_side();
        TradeWire {
            timestamp: self.timestamp.to_rfc3339(),
            signature: self.signature.clone(),
            action: self.action(),
            token: token.symbol.clone(),
            amount: round_display(token.amount, 6),
            token_in: WireSide::from(&self.token_in),
            token_out: WireSide::from(&self.token_out),
            price: self.price_usd.map(|p| round_display(p, 6)),
            value_usd: self.value_usd.map(|v| round_display(v, 4)),
            pnl_usd: round_display(self.pnl_usd, 4),
            fees_usd: round_display(self.fees_usd, 4),
            priced: self.priced,
            dex: self.dex.clone(),
            tx_type: self.tx_type.clone(),
        }
    }
}

// =============================================================================
// WIRE SHAPE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSide {
    pub mint: String,
    pub symbol: String,
    pub amount: f64,
}

impl From<&TokenSide> for WireSide {
    fn from(side: &TokenSide) -> Self {
        Self {
            mint: side.mint.clone(),
            symbol: side.symbol.clone(),
            amount: round_display(side.amount, 6),
        }
    }
}

/// JSON shape of a trade as served to consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeWire {
    pub timestamp: String,
    pub signature: String,
    pub action: TradeAction,
    pub token: String,
    pub amount: f64,
    pub token_in: WireSide,
    pub token_out: WireSide,
    pub price: Option<f64>,
    pub value_usd: Option<f64>,
    pub pnl_usd: f64,
    pub fees_usd: f64,
    pub priced: bool,
    pub dex: String,
    pub tx_type: String,
}

// =============================================================================
// RESULT ENVELOPE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSummary {
    pub total_trades: usize,
    pub total_pnl_usd: f64,
    /// Fraction of priced sells with positive realized P&L, 0..100
    pub win_rate: f64,
    pub priced_trades: usize,
    pub metrics: serde_json::Value,
}

/// Top-level result of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReport {
    pub wallet: String,
    pub from_slot: u64,
    pub to_slot: u64,
    pub elapsed_seconds: f64,
    pub summary: TradeSummary,
    pub trades: Vec<TradeWire>,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Round for display with round-half-to-even at `dp` decimal places
pub fn round_display(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(dp as i32);
    (value * factor).round_ties_even() / factor
}

/// Best-effort symbol for a mint. Known system tokens resolve to their
/// tickers, everything else renders as a shortened mint.
pub fn symbol_for_mint(mint: &str) -> String {
    if is_native_mint(mint) {
        return "SOL".to_string();
    }
    match mint {
        USDC_MINT => "USDC".to_string(),
        USDT_MINT => "USDT".to_string(),
        _ => {
            if mint.len() > 8 {
                format!("{}..{}", &mint[..4], &mint[mint.len() - 4..])
            } else {
                mint.to_string()
            }
        }
    }
}

/// Convert a block timestamp into a UTC datetime, clamping garbage to epoch
pub fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}
