/// Wire types for the ledger RPC service
///
/// Transaction bodies come back in the enriched form the upstream indexer
/// serves: a structured swap event when its parser recognized the venue,
/// plus flat token/native transfer lists for everything else. Amount fields
/// that must stay decimal-exact are strings on the wire.

use serde::{Deserialize, Serialize};

// =============================================================================
// SIGNATURE LISTING
// =============================================================================

/// One row of the cursor-based signature listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    /// Present when the transaction failed on-chain
    pub err: Option<serde_json::Value>,
}

/// One page of the signature walk. The server reports a next-cursor
/// whenever more history exists; an empty page that still carries a
/// cursor is the truncation signal the paginator watches for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignaturePage {
    #[serde(default)]
    pub signatures: Vec<SignatureInfo>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

// =============================================================================
// ENRICHED TRANSACTION BODY
// =============================================================================

/// Full transaction body as returned by the batch lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: u64,
    /// Unix timestamp of the containing block
    pub timestamp: i64,
    /// Transaction fee in lamports
    #[serde(default)]
    pub fee: u64,
    /// Venue label assigned by the upstream indexer (e.g. "RAYDIUM")
    #[serde(default)]
    pub source: Option<String>,
    /// Coarse transaction classification (e.g. "SWAP", "TRANSFER")
    #[serde(rename = "type", default)]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub events: TransactionEvents,
    #[serde(rename = "tokenTransfers", default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(rename = "nativeTransfers", default)]
    pub native_transfers: Vec<NativeTransfer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionEvents {
    #[serde(default)]
    pub swap: Option<SwapEvent>,
}

/// Structured swap event. Multi-hop swaps carry one leg per hop in
/// execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    #[serde(rename = "nativeInput", default)]
    pub native_input: Option<NativeLeg>,
    #[serde(rename = "nativeOutput", default)]
    pub native_output: Option<NativeLeg>,
    #[serde(rename = "tokenInputs", default)]
    pub token_inputs: Vec<TokenLeg>,
    #[serde(rename = "tokenOutputs", default)]
    pub token_outputs: Vec<TokenLeg>,
}

/// Native-currency leg of a swap; amount is lamports as a decimal string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeLeg {
    pub account: String,
    pub amount: String,
}

/// Token leg of a swap with its decimal-exact raw amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLeg {
    #[serde(rename = "userAccount")]
    pub user_account: String,
    pub mint: String,
    #[serde(rename = "rawTokenAmount")]
    pub raw_token_amount: RawTokenAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTokenAmount {
    #[serde(rename = "tokenAmount")]
    pub token_amount: String,
    pub decimals: u8,
}

impl RawTokenAmount {
    /// Decimal-adjusted ui amount; None when the wire value is malformed
    pub fn ui_amount(&self) -> Option<f64> {
        let raw = self.token_amount.parse::<f64>().ok()?;
        if !raw.is_finite() {
            return None;
        }
        Some(raw / 10f64.powi(self.decimals as i32))
    }
}

/// Flat token transfer row used by the heuristic parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub mint: String,
    #[serde(rename = "fromUserAccount", default)]
    pub from_user_account: Option<String>,
    #[serde(rename = "toUserAccount", default)]
    pub to_user_account: Option<String>,
    /// Raw amount in base units
    #[serde(rename = "rawAmount")]
    pub raw_amount: u64,
    pub decimals: u8,
}

impl TokenTransfer {
    pub fn ui_amount(&self) -> f64 {
        (self.raw_amount as f64) / 10f64.powi(self.decimals as i32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeTransfer {
    #[serde(rename = "fromUserAccount", default)]
    pub from_user_account: Option<String>,
    #[serde(rename = "toUserAccount", default)]
    pub to_user_account: Option<String>,
    /// Lamports moved
    pub amount: u64,
}

// =============================================================================
// TOKEN SUPPLY
// =============================================================================

/// Result of the token-supply lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSupply {
    pub amount: String,
    pub decimals: u8,
    #[serde(rename = "uiAmount")]
    pub ui_amount: Option<f64>,
}

impl TokenSupply {
    /// Supply in ui units, derived from the raw amount when the server
    /// omitted the pre-computed field
    pub fn supply(&self) -> Option<f64> {
        if let Some(ui) = self.ui_amount {
            return Some(ui);
        }
        let raw = self.amount.parse::<f64>().ok()?;
        Some(raw / 10f64.powi(self.decimals as i32))
    }
}

// =============================================================================
// POOL ACCOUNTS
// =============================================================================

/// AMM flavor a pool account was fetched from; decides the reserve layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolProgram {
    /// Constant-product pool with vault balances as reserves
    ConstantProduct,
    /// Bonding-curve pool with virtual + real reserve fields
    BondingCurve,
}

/// Raw pool account returned by the pool enumeration call
#[derive(Debug, Clone)]
pub struct PoolAccount {
    pub address: String,
    pub program: PoolProgram,
    /// Decoded account data (base64 on the wire)
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_token_amount_ui() {
        let amount = RawTokenAmount {
            token_amount: "1500000".to_string(),
            decimals: 6,
        };
        assert_eq!(amount.ui_amount(), Some(1.5));
    }

    #[test]
    fn test_raw_token_amount_malformed() {
        let amount = RawTokenAmount {
            token_amount: "not-a-number".to_string(),
            decimals: 6,
        };
        assert_eq!(amount.ui_amount(), None);
    }

    #[test]
    fn test_token_supply_from_raw() {
        let supply = TokenSupply {
            amount: "1000000000000000".to_string(),
            decimals: 6,
            ui_amount: None,
        };
        assert_eq!(supply.supply(), Some(1_000_000_000.0));
    }
}
