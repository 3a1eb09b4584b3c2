/// FIFO cost-basis ledger
///
/// Per (wallet, token) the engine keeps an ordered queue of open lots
/// `(amount, cost)`. A buy enqueues a lot; a sell consumes lots from the
/// front, splitting a partially consumed lot proportionally. Realized P&L
/// for a sell is its USD proceeds minus the basis removed; a sell with
/// unpriced proceeds realizes zero, never a negative default.
///
/// The working set is exclusively owned by one pipeline run for one
/// wallet; positions are never shared across wallets.

use crate::trades::types::{PositionLink, Trade, TradeAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Balances below this are treated as a closed position
const POSITION_EPSILON: f64 = 1e-9;

/// One open buy lot
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub amount: f64,
    pub cost_usd: f64,
    /// Cost in native units (what the buy leg spent)
    pub cost_native: f64,
}

/// Aggregate per-token position state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub mint: String,
    pub symbol: String,
    pub balance: f64,
    pub cost_basis_usd: f64,
    pub cost_basis_native: f64,
    /// Accounting method; only FIFO is implemented
    pub cost_basis_method: String,
    pub open: bool,
    pub trade_count: u32,
    pub last_slot: u64,
    pub last_update: DateTime<Utc>,
    #[serde(skip)]
    lots: VecDeque<Lot>,
}

impl Position {
    fn new(mint: &str, symbol: &str) -> Self {
        Self {
            mint: mint.to_string(),
            symbol: symbol.to_string(),
            balance: 0.0,
            cost_basis_usd: 0.0,
            cost_basis_native: 0.0,
            cost_basis_method: "fifo".to_string(),
            open: true,
            trade_count: 0,
            last_slot: 0,
            last_update: Utc::now(),
            lots: VecDeque::new(),
        }
    }

    pub fn lots(&self) -> &VecDeque<Lot> {
        &self.lots
    }
}

/// Outcome of applying one sell against the lot queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisRemoved {
    pub usd: f64,
    pub native: f64,
    /// Amount actually matched against open lots
    pub matched: f64,
}

pub struct FifoLedger {
    wallet: String,
    positions: std::collections::HashMap<String, Position>,
}

impl FifoLedger {
    pub fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            positions: std::collections::HashMap::new(),
        }
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// Apply one trade in chronological order: fills `pnl_usd` and the
    /// position linkage on the trade, mutating the per-token position.
    pub fn apply(&mut self, trade: &mut Trade) {
        let token = trade.token_side().clone();
        let position = self
            .positions
            .entry(token.mint.clone())
            .or_insert_with(|| Position::new(&token.mint, &token.symbol));

        match trade.action() {
            TradeAction::Buy => {
                let cost_usd = trade.value_usd.unwrap_or(0.0);
                position.lots.push_back(Lot {
                    amount: token.amount,
                    cost_usd,
                    cost_native: trade.token_in.amount,
                });
                position.balance += token.amount;
                position.cost_basis_usd += cost_usd;
                position.cost_basis_native += trade.token_in.amount;
                position.open = true;
            }
            TradeAction::Sell => {
                let removed = consume_lots(&mut position.lots, token.amount);
                position.balance = (position.balance - token.amount).max(0.0);
                position.cost_basis_usd = (position.cost_basis_usd - removed.usd).max(0.0);
                position.cost_basis_native =
                    (position.cost_basis_native - removed.native).max(0.0);

                // Unpriced proceeds realize zero, never negative-by-default
                trade.pnl_usd = match trade.value_usd {
                    Some(proceeds) => proceeds - removed.usd,
                    None => 0.0,
                };

                if position.balance <= POSITION_EPSILON {
                    position.balance = 0.0;
                    position.open = false;
                    position.lots.clear();
                    position.cost_basis_usd = 0.0;
                    position.cost_basis_native = 0.0;
                }
            }
        }

        position.trade_count += 1;
        position.last_slot = trade.slot;
        position.last_update = trade.timestamp;

        trade.position = Some(PositionLink {
            remaining_balance: position.balance,
            cost_basis_method: position.cost_basis_method.clone(),
            closed: !position.open,
        });
    }

    /// Open positions remaining after the run, for the unrealized pass
    pub fn open_positions(&self) -> Vec<&Position> {
        let mut open: Vec<&Position> = self.positions.values().filter(|p| p.open).collect();
        open.sort_by(|a, b| a.mint.cmp(&b.mint));
        open
    }

    pub fn position(&self, mint: &str) -> Option<&Position> {
        self.positions.get(mint)
    }
}

/// Consume `amount` from the front of the lot queue, splitting the last
/// touched lot proportionally. Any amount beyond the open lots carries no
/// basis (history incomplete upstream, not an error).
fn consume_lots(lots: &mut VecDeque<Lot>, amount: f64) -> BasisRemoved {
    let mut remaining = amount;
    let mut removed = BasisRemoved { usd: 0.0, native: 0.0, matched: 0.0 };

    while remaining > POSITION_EPSILON {
        let Some(front) = lots.front_mut() else {
            break;
        };

        if front.amount <= remaining + POSITION_EPSILON {
            // Lot fully consumed
            remaining -= front.amount;
            removed.usd += front.cost_usd;
            removed.native += front.cost_native;
            removed.matched += front.amount;
            lots.pop_front();
        } else {
            // Partial consumption: pro-rate the cost, leave the remainder
            let fraction = remaining / front.amount;
            let usd_share = front.cost_usd * fraction;
            let native_share = front.cost_native * fraction;

            front.amount -= remaining;
            front.cost_usd -= usd_share;
            front.cost_native -= native_share;

            removed.usd += usd_share;
            removed.native += native_share;
            removed.matched += remaining;
            remaining = 0.0;
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SOL_MINT;
    use crate::trades::types::{timestamp_to_datetime, TokenSide};

    const MINT: &str = "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const WALLET: &str = "WaLLet1111111111111111111111111111111111111";

    fn buy(sig: &str, slot: u64, sol_in: f64, tokens_out: f64, value_usd: Option<f64>) -> Trade {
        Trade {
            signature: sig.to_string(),
            slot,
            timestamp: timestamp_to_datetime(1_700_000_000 + slot as i64),
            token_in: TokenSide::new(SOL_MINT, sol_in),
            token_out: TokenSide::new(MINT, tokens_out),
            price_usd: None,
            value_usd,
            pnl_usd: 0.0,
            fee_lamports: 5_000,
            fees_usd: 0.0,
            dex: "RAYDIUM".to_string(),
            tx_type: "SWAP".to_string(),
            priced: value_usd.is_some(),
            position: None,
        }
    }

    fn sell(sig: &str, slot: u64, tokens_in: f64, sol_out: f64, value_usd: Option<f64>) -> Trade {
        Trade {
            signature: sig.to_string(),
            slot,
            timestamp: timestamp_to_datetime(1_700_000_000 + slot as i64),
            token_in: TokenSide::new(MINT, tokens_in),
            token_out: TokenSide::new(SOL_MINT, sol_out),
            price_usd: None,
            value_usd,
            pnl_usd: 0.0,
            fee_lamports: 5_000,
            fees_usd: 0.0,
            dex: "RAYDIUM".to_string(),
            tx_type: "SWAP".to_string(),
            priced: value_usd.is_some(),
            position: None,
        }
    }

    #[test]
    fn test_fifo_worked_example() {
        // Lots [(10, $100), (5, $60)], sell 12 for $200:
        // basis removed = $100 + 2/5 * $60 = $124, pnl = $76, remainder (3, $36)
        let mut ledger = FifoLedger::new(WALLET);

        ledger.apply(&mut buy("b1", 1, 1.0, 10.0, Some(100.0)));
        ledger.apply(&mut buy("b2", 2, 0.6, 5.0, Some(60.0)));

        let mut s = sell("s1", 3, 12.0, 2.0, Some(200.0));
        ledger.apply(&mut s);

        assert!((s.pnl_usd - 76.0).abs() < 1e-9);

        let position = ledger.position(MINT).unwrap();
        assert!((position.balance - 3.0).abs() < 1e-9);
        assert_eq!(position.lots().len(), 1);
        let remainder = &position.lots()[0];
        assert!((remainder.amount - 3.0).abs() < 1e-9);
        assert!((remainder.cost_usd - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_end_to_end_scenario() {
        // Buy 1,000,000 tokens for $500, sell 200,000 for $150:
        // pnl = 150 - (200000/1000000)*500 = 50; balance 800,000; basis $400
        let mut ledger = FifoLedger::new(WALLET);

        ledger.apply(&mut buy("b1", 1, 2.5, 1_000_000.0, Some(500.0)));

        let mut s = sell("s1", 2, 200_000.0, 0.75, Some(150.0));
        ledger.apply(&mut s);

        assert!((s.pnl_usd - 50.0).abs() < 1e-9);

        let position = ledger.position(MINT).unwrap();
        assert!((position.balance - 800_000.0).abs() < 1e-6);
        assert!((position.cost_basis_usd - 400.0).abs() < 1e-9);
        assert!(position.open);
    }

    #[test]
    fn test_unpriced_sell_realizes_zero() {
        let mut ledger = FifoLedger::new(WALLET);
        ledger.apply(&mut buy("b1", 1, 1.0, 100.0, Some(50.0)));

        let mut s = sell("s1", 2, 40.0, 0.5, None);
        ledger.apply(&mut s);

        assert_eq!(s.pnl_usd, 0.0);
        // The balance and basis still move
        let position = ledger.position(MINT).unwrap();
        assert!((position.balance - 60.0).abs() < 1e-9);
        assert!((position.cost_basis_usd - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_closes_at_zero_balance() {
        let mut ledger = FifoLedger::new(WALLET);
        ledger.apply(&mut buy("b1", 1, 1.0, 100.0, Some(50.0)));

        let mut s = sell("s1", 2, 100.0, 1.2, Some(60.0));
        ledger.apply(&mut s);

        let position = ledger.position(MINT).unwrap();
        assert!(!position.open);
        assert_eq!(position.balance, 0.0);
        assert_eq!(s.position.as_ref().unwrap().closed, true);
        assert!((s.pnl_usd - 10.0).abs() < 1e-9);
        assert!(ledger.open_positions().is_empty());
    }

    #[test]
    fn test_sell_beyond_history_has_no_phantom_basis() {
        let mut ledger = FifoLedger::new(WALLET);
        ledger.apply(&mut buy("b1", 1, 1.0, 10.0, Some(100.0)));

        // Sell 25 with only 10 on the books: excess carries zero basis
        let mut s = sell("s1", 2, 25.0, 3.0, Some(300.0));
        ledger.apply(&mut s);

        assert!((s.pnl_usd - 200.0).abs() < 1e-9);
        assert!(!ledger.position(MINT).unwrap().open);
    }

    #[test]
    fn test_trade_count_and_linkage() {
        let mut ledger = FifoLedger::new(WALLET);
        let mut b = buy("b1", 7, 1.0, 10.0, Some(100.0));
        ledger.apply(&mut b);

        let link = b.position.unwrap();
        assert_eq!(link.remaining_balance, 10.0);
        assert_eq!(link.cost_basis_method, "fifo");
        assert!(!link.closed);

        let position = ledger.position(MINT).unwrap();
        assert_eq!(position.trade_count, 1);
        assert_eq!(position.last_slot, 7);
    }
}
