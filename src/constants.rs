/// Global constants used across walletscope
///
/// This module contains system-wide constants that are not configurable
/// and are used across multiple modules.

// ============================================================================
// SOLANA BLOCKCHAIN CONSTANTS
// ============================================================================

/// SOL token mint address (wrapped SOL / WSOL)
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Number of decimal places for SOL token
pub const SOL_DECIMALS: u8 = 9;

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Wrapped SOL mint (alias for SOL_MINT)
pub const WRAPPED_SOL_MINT: &str = SOL_MINT;

/// Native SOL representation (system program ID placeholder used in some pools)
pub const NATIVE_SOL_MINT: &str = "11111111111111111111111111111111";

/// Common stablecoin mints used as USD quote legs
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Alias for WSOL (wrapped SOL) mint (some modules import WSOL_MINT)
pub const WSOL_MINT: &str = WRAPPED_SOL_MINT;

/// Fixed circulating supply used for the native token instead of an RPC call
pub const SOL_FIXED_SUPPLY: f64 = 467_000_000.0;

// ============================================================================
// PIPELINE CONSTANTS
// ============================================================================

/// Trades where either leg is below this ui-amount are discarded as dust
pub const DUST_THRESHOLD: f64 = 1e-7;

/// Minimum pool TVL in USD for a high-confidence on-chain price
pub const DEFAULT_MIN_POOL_TVL_USD: f64 = 5_000.0;

/// A high-confidence price older than this is downgraded to an estimate
pub const PRICE_FRESH_SECONDS: i64 = 60;

/// A price older than this is stale regardless of where it came from
pub const PRICE_STALE_SECONDS: i64 = 300;

/// Returns true for mints we treat as USD-stable quote legs
pub fn is_stable_mint(mint: &str) -> bool {
    mint == USDC_MINT || mint == USDT_MINT
}

/// Returns true for the native token in either of its representations
pub fn is_native_mint(mint: &str) -> bool {
    mint == SOL_MINT || mint == NATIVE_SOL_MINT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_mint_detection() {
        assert!(is_native_mint(SOL_MINT));
        assert!(is_native_mint(NATIVE_SOL_MINT));
        assert!(!is_native_mint(USDC_MINT));
    }

    #[test]
    fn test_stable_mint_detection() {
        assert!(is_stable_mint(USDC_MINT));
        assert!(is_stable_mint(USDT_MINT));
        assert!(!is_stable_mint(SOL_MINT));
    }
}
