/// Trade extraction from raw transaction bodies
///
/// Two parser strategies are tried in order per transaction, first success
/// wins: the structured swap-event parser, then a heuristic over raw token
/// transfers. A dedup map keyed by signature guarantees at most one trade
/// per signature regardless of how batches arrived; output is sorted by
/// (slot, signature) so the same input always yields identical output.

use crate::constants::{DUST_THRESHOLD, LAMPORTS_PER_SOL, SOL_MINT};
use crate::logger::{self, LogTag};
use crate::rpc::types::{RawTransaction, SwapEvent, TokenTransfer};
use crate::trades::metrics::ExtractionMetrics;
use crate::trades::types::{timestamp_to_datetime, TokenSide, Trade};
use std::collections::HashMap;

/// A parser strategy: pure function from body to a candidate trade
type ParserFn = fn(&RawTransaction, &str) -> Option<Trade>;

/// Strategies in priority order; the label feeds the per-path metrics
const PARSERS: [(&str, ParserFn); 2] = [
    ("event", parse_swap_event),
    ("transfer", parse_token_transfers),
];

pub struct TradeExtractor;

impl TradeExtractor {
    /// Extract trades for a wallet from fetched bodies, applying dedup and
    /// the dust filter. Metrics record every drop reason.
    pub fn extract(
        transactions: &[RawTransaction],
        wallet: &str,
        metrics: &mut ExtractionMetrics,
    ) -> Vec<Trade> {
        let mut by_signature: HashMap<String, Trade> = HashMap::new();

        for tx in transactions {
            metrics.transactions_parsed += 1;

            if by_signature.contains_key(&tx.signature) {
                metrics.duplicates += 1;
                continue;
            }

            let mut parsed = None;
            for (label, parser) in PARSERS {
                if let Some(trade) = parser(tx, wallet) {
                    parsed = Some((label, trade));
                    break;
                }
            }

            let Some((label, trade)) = parsed else {
                metrics.parse_errors += 1;
                continue;
            };

            if trade.token_in.amount.min(trade.token_out.amount) < DUST_THRESHOLD {
                metrics.dust_filtered += 1;
                continue;
            }

            match label {
                "event" => metrics.event_parser_trades += 1,
                _ => metrics.transfer_parser_trades += 1,
            }
            by_signature.insert(tx.signature.clone(), trade);
        }

        let mut trades: Vec<Trade> = by_signature.into_values().collect();
        trades.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.signature.cmp(&b.signature)));

        logger::info(
            LogTag::Trades,
            &format!(
                "Extracted {} trades ({} event, {} heuristic, {} duplicates, {} dust, {} unparseable)",
                trades.len(),
                metrics.event_parser_trades,
                metrics.transfer_parser_trades,
                metrics.duplicates,
                metrics.dust_filtered,
                metrics.parse_errors
            ),
        );

        trades
    }
}

// =============================================================================
// STRUCTURED PARSER
// =============================================================================

/// Read the explicit swap event, collapsing a multi-hop route to its first
/// input leg and last output leg. Malformed amounts invalidate the trade.
fn parse_swap_event(tx: &RawTransaction, _wallet: &str) -> Option<Trade> {
    let event = tx.events.swap.as_ref()?;

    let token_in = swap_input_side(event)?;
    let token_out = swap_output_side(event)?;

    if token_in.amount <= 0.0 || token_out.amount <= 0.0 {
        return None;
    }

    Some(Trade {
        signature: tx.signature.clone(),
        slot: tx.slot,
        timestamp: timestamp_to_datetime(tx.timestamp),
        token_in,
        token_out,
        price_usd: None,
        value_usd: None,
        pnl_usd: 0.0,
        fee_lamports: tx.fee,
        fees_usd: 0.0,
        dex: tx.source.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        tx_type: tx.tx_type.clone().unwrap_or_else(|| "SWAP".to_string()),
        priced: false,
        position: None,
    })
}

fn swap_input_side(event: &SwapEvent) -> Option<TokenSide> {
    if let Some(native) = &event.native_input {
        let lamports = native.amount.parse::<f64>().ok().filter(|v| v.is_finite())?;
        return Some(TokenSide::new(SOL_MINT, lamports / (LAMPORTS_PER_SOL as f64)));
    }

    let leg = event.token_inputs.first()?;
    let amount = leg.raw_token_amount.ui_amount()?;
    Some(TokenSide::new(&leg.mint, amount))
}

fn swap_output_side(event: &SwapEvent) -> Option<TokenSide> {
    if let Some(native) = &event.native_output {
        let lamports = native.amount.parse::<f64>().ok().filter(|v| v.is_finite())?;
        return Some(TokenSide::new(SOL_MINT, lamports / (LAMPORTS_PER_SOL as f64)));
    }

    let leg = event.token_outputs.last()?;
    let amount = leg.raw_token_amount.ui_amount()?;
    Some(TokenSide::new(&leg.mint, amount))
}

// =============================================================================
// HEURISTIC PARSER
// =============================================================================

/// Fallback when no structured event exists: the largest transfer leaving
/// the wallet paired with the largest transfer entering it. A pair on the
/// same mint is a move, not a swap.
fn parse_token_transfers(tx: &RawTransaction, wallet: &str) -> Option<Trade> {
    let outgoing = largest_transfer(&tx.token_transfers, |t| {
        t.from_user_account.as_deref() == Some(wallet)
    })?;
    let incoming = largest_transfer(&tx.token_transfers, |t| {
        t.to_user_account.as_deref() == Some(wallet)
    })?;

    if outgoing.mint == incoming.mint {
        return None;
    }

    Some(Trade {
        signature: tx.signature.clone(),
        slot: tx.slot,
        timestamp: timestamp_to_datetime(tx.timestamp),
        token_in: TokenSide::new(&outgoing.mint, outgoing.ui_amount()),
        token_out: TokenSide::new(&incoming.mint, incoming.ui_amount()),
        price_usd: None,
        value_usd: None,
        pnl_usd: 0.0,
        fee_lamports: tx.fee,
        fees_usd: 0.0,
        dex: tx.source.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        tx_type: tx.tx_type.clone().unwrap_or_else(|| "SWAP".to_string()),
        priced: false,
        position: None,
    })
}

fn largest_transfer<'a>(
    transfers: &'a [TokenTransfer],
    matches: impl Fn(&TokenTransfer) -> bool,
) -> Option<&'a TokenTransfer> {
    transfers
        .iter()
        .filter(|t| matches(t))
        .max_by_key(|t| t.raw_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::*;

    const WALLET: &str = "WaLLet1111111111111111111111111111111111111";
    const MINT_A: &str = "MintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const MINT_B: &str = "MintBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    fn base_tx(signature: &str) -> RawTransaction {
        RawTransaction {
            signature: signature.to_string(),
            slot: 100,
            timestamp: 1_700_000_000,
            fee: 5_000,
            source: Some("RAYDIUM".to_string()),
            tx_type: Some("SWAP".to_string()),
            events: TransactionEvents::default(),
            token_transfers: Vec::new(),
            native_transfers: Vec::new(),
        }
    }

    fn token_leg(mint: &str, amount: &str, decimals: u8) -> TokenLeg {
        TokenLeg {
            user_account: WALLET.to_string(),
            mint: mint.to_string(),
            raw_token_amount: RawTokenAmount {
                token_amount: amount.to_string(),
                decimals,
            },
        }
    }

    fn transfer(mint: &str, from: Option<&str>, to: Option<&str>, raw: u64) -> TokenTransfer {
        TokenTransfer {
            mint: mint.to_string(),
            from_user_account: from.map(|s| s.to_string()),
            to_user_account: to.map(|s| s.to_string()),
            raw_amount: raw,
            decimals: 6,
        }
    }

    fn swap_buy_tx(signature: &str) -> RawTransaction {
        let mut tx = base_tx(signature);
        tx.events.swap = Some(SwapEvent {
            native_input: Some(NativeLeg {
                account: WALLET.to_string(),
                amount: "1000000000".to_string(), // 1 SOL
            }),
            native_output: None,
            token_inputs: Vec::new(),
            token_outputs: vec![token_leg(MINT_A, "250000000", 6)], // 250 tokens
        });
        tx
    }

    #[test]
    fn test_event_parser_native_buy() {
        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[swap_buy_tx("sig1")], WALLET, &mut metrics);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].token_in.mint, SOL_MINT);
        assert_eq!(trades[0].token_in.amount, 1.0);
        assert_eq!(trades[0].token_out.amount, 250.0);
        assert_eq!(metrics.event_parser_trades, 1);
    }

    #[test]
    fn test_event_parser_multi_hop_collapse() {
        let mut tx = base_tx("sig1");
        tx.events.swap = Some(SwapEvent {
            native_input: None,
            native_output: None,
            token_inputs: vec![
                token_leg(MINT_A, "1000000", 6), // first input wins
                token_leg(MINT_B, "999", 6),
            ],
            token_outputs: vec![
                token_leg(MINT_B, "5", 6),
                token_leg(MINT_B, "7000000", 6), // last output wins
            ],
        });

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[tx], WALLET, &mut metrics);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].token_in.amount, 1.0);
        assert_eq!(trades[0].token_out.amount, 7.0);
    }

    #[test]
    fn test_event_parser_malformed_amount_falls_through() {
        let mut tx = base_tx("sig1");
        tx.events.swap = Some(SwapEvent {
            native_input: None,
            native_output: None,
            token_inputs: vec![token_leg(MINT_A, "garbage", 6)],
            token_outputs: vec![token_leg(MINT_B, "1000000", 6)],
        });

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[tx], WALLET, &mut metrics);

        // No transfers either, so both strategies reject it
        assert!(trades.is_empty());
        assert_eq!(metrics.parse_errors, 1);
    }

    #[test]
    fn test_heuristic_parser_picks_largest_legs() {
        let mut tx = base_tx("sig1");
        tx.token_transfers = vec![
            transfer(MINT_A, Some(WALLET), Some("other"), 500),
            transfer(MINT_A, Some(WALLET), Some("other"), 9_000_000),
            transfer(MINT_B, Some("other"), Some(WALLET), 4_000_000),
            transfer(MINT_B, Some("other"), Some(WALLET), 100),
        ];

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[tx], WALLET, &mut metrics);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].token_in.amount, 9.0);
        assert_eq!(trades[0].token_out.amount, 4.0);
        assert_eq!(metrics.transfer_parser_trades, 1);
    }

    #[test]
    fn test_heuristic_rejects_same_mint_pair() {
        let mut tx = base_tx("sig1");
        tx.token_transfers = vec![
            transfer(MINT_A, Some(WALLET), Some("other"), 100),
            transfer(MINT_A, Some("other"), Some(WALLET), 100),
        ];

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[tx], WALLET, &mut metrics);

        assert!(trades.is_empty());
        assert_eq!(metrics.parse_errors, 1);
    }

    #[test]
    fn test_duplicate_signatures_counted_once() {
        let txs = vec![swap_buy_tx("sig1"), swap_buy_tx("sig1"), swap_buy_tx("sig2")];

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&txs, WALLET, &mut metrics);

        assert_eq!(trades.len(), 2);
        assert_eq!(metrics.duplicates, 1);
    }

    #[test]
    fn test_dust_filter() {
        let mut tx = base_tx("sig1");
        tx.events.swap = Some(SwapEvent {
            native_input: Some(NativeLeg {
                account: WALLET.to_string(),
                amount: "10".to_string(), // 1e-8 SOL, below the floor
            }),
            native_output: None,
            token_inputs: Vec::new(),
            token_outputs: vec![token_leg(MINT_A, "250000000", 6)],
        });

        let mut metrics = ExtractionMetrics::new();
        let trades = TradeExtractor::extract(&[tx], WALLET, &mut metrics);

        assert!(trades.is_empty());
        assert_eq!(metrics.dust_filtered, 1);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let txs = vec![swap_buy_tx("sigB"), swap_buy_tx("sigA")];

        let mut m1 = ExtractionMetrics::new();
        let mut m2 = ExtractionMetrics::new();
        let run1 = TradeExtractor::extract(&txs, WALLET, &mut m1);
        let run2 = TradeExtractor::extract(&txs, WALLET, &mut m2);

        assert_eq!(run1, run2);
        // Sorted by (slot, signature)
        assert_eq!(run1[0].signature, "sigA");
        assert_eq!(run1[1].signature, "sigB");
    }
}
