//! Ledger RPC transport layer
//!
//! - [`client`] - JSON-RPC client with per-call retry and batch support
//! - [`throttle`] - adaptive fan-out limiter and backoff policies
//! - [`types`] - wire types for signatures, transactions, supply and pools

pub mod client;
pub mod throttle;
pub mod types;

pub use client::{LedgerClient, LedgerRpc};
pub use throttle::{rate_limit_backoff, AdaptiveLimiter, ExponentialBackoff, ThrottleStats};
pub use types::*;

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Validate a wallet address before any network call is made
pub fn validate_wallet_address(address: &str) -> bool {
    Pubkey::from_str(address).is_ok()
}

/// Cheap shape check for transaction signatures (base58, 64 bytes decoded)
pub fn is_valid_signature(signature: &str) -> bool {
    if signature.len() < 80 || signature.len() > 90 {
        return false;
    }
    matches!(bs58::decode(signature).into_vec(), Ok(bytes) if bytes.len() == 64)
}
