/// On-chain AMM price reader
///
/// Enumerates candidate liquidity pools for a pair, decodes their reserve
/// layouts, values each pool in USD and derives a price from the deepest
/// one. Two layouts are understood:
///
/// - constant-product pools, where the vault balances are the reserves;
/// - bonding-curve pools, which carry virtual and real reserve fields.
///   Virtual and real reserves are summed before the price ratio is taken,
///   but TVL is computed from real reserves only so synthetic depth cannot
///   overstate liquidity.

use crate::constants::is_native_mint;
use crate::errors::ApiResult;
use crate::logger::{self, LogTag};
use crate::prices::types::{Confidence, PriceResult};
use crate::rpc::types::{PoolAccount, PoolProgram};
use crate::rpc::LedgerRpc;
use chrono::Utc;
use std::sync::Arc;

// =============================================================================
// ACCOUNT LAYOUTS
// =============================================================================

// Constant-product pool layout offsets
const CP_BASE_MINT_OFFSET: usize = 168;
const CP_QUOTE_MINT_OFFSET: usize = 200;
const CP_BASE_RESERVE_OFFSET: usize = 232;
const CP_QUOTE_RESERVE_OFFSET: usize = 240;
const CP_BASE_DECIMALS_OFFSET: usize = 248;
const CP_QUOTE_DECIMALS_OFFSET: usize = 249;
const CP_MIN_DATA_LEN: usize = 250;

// Bonding-curve pool layout offsets
const BC_VIRTUAL_BASE_OFFSET: usize = 8;
const BC_VIRTUAL_QUOTE_OFFSET: usize = 16;
const BC_REAL_BASE_OFFSET: usize = 24;
const BC_REAL_QUOTE_OFFSET: usize = 32;
const BC_BASE_MINT_OFFSET: usize = 43;
const BC_QUOTE_MINT_OFFSET: usize = 75;
const BC_BASE_DECIMALS_OFFSET: usize = 107;
const BC_QUOTE_DECIMALS_OFFSET: usize = 108;
const BC_MIN_DATA_LEN: usize = 109;

/// TVL under which an `amm:medium` annotation drops to `amm:low`
const LOW_TVL_CUTOFF_USD: f64 = 1_000.0;

/// Reserves of one decoded pool, normalized so `base` is the token being
/// priced and `quote` is the pair's quote side
#[derive(Debug, Clone)]
struct DecodedPool {
    address: String,
    /// Reserves used for the price ratio (virtual + real for curves)
    base_reserve: f64,
    quote_reserve: f64,
    /// Real reserves only, used for TVL
    real_quote_reserve: f64,
    base_decimals: u8,
    quote_decimals: u8,
}

pub struct AmmReader {
    rpc: Arc<dyn LedgerRpc>,
    min_pool_tvl_usd: f64,
}

impl AmmReader {
    pub fn new(rpc: Arc<dyn LedgerRpc>, min_pool_tvl_usd: f64) -> Self {
        Self { rpc, min_pool_tvl_usd }
    }

    /// Enumerate candidate pool accounts for the pair
    pub async fn fetch_pools(&self, mint: &str, quote: &str) -> ApiResult<Vec<PoolAccount>> {
        self.rpc.get_pool_accounts(mint, quote).await
    }

    /// Price `mint` against `quote` from on-chain pool reserves.
    ///
    /// `quote_price_usd` is the previously resolved USD price of the quote
    /// token (the native price for SOL pairs, 1.0 for stables). Returns
    /// `None` when no pool can be decoded at all; a pool under the TVL
    /// floor still answers, downgraded and annotated.
    pub async fn get_price(
        &self,
        mint: &str,
        quote: &str,
        quote_price_usd: f64,
    ) -> ApiResult<Option<PriceResult>> {
        let accounts = self.fetch_pools(mint, quote).await?;
        Ok(self.price_from_accounts(mint, &accounts, quote_price_usd))
    }

    /// Derive a price from already-fetched pool accounts
    pub fn price_from_accounts(
        &self,
        mint: &str,
        accounts: &[PoolAccount],
        quote_price_usd: f64,
    ) -> Option<PriceResult> {
        if quote_price_usd <= 0.0 || accounts.is_empty() {
            return None;
        }

        let mut pools: Vec<(DecodedPool, f64)> = Vec::new();
        for account in accounts {
            let Some(pool) = decode_pool(account, mint) else {
                continue;
            };

            // Both sides of a balanced pool carry the same value, so TVL is
            // twice the quote side, valued at the resolved quote price
            let quote_ui =
                pool.real_quote_reserve / 10f64.powi(pool.quote_decimals as i32);
            let tvl_usd = quote_ui * quote_price_usd * 2.0;
            pools.push((pool, tvl_usd));
        }

        if pools.is_empty() {
            logger::debug(LogTag::Pool, &format!("No decodable pools for {}", mint));
            return None;
        }

        // Deepest pool wins
        pools.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let (best, tvl_usd) = &pools[0];

        let price_in_quote = pool_price(best)?;
        let price_usd = price_in_quote * quote_price_usd;
        if !price_usd.is_finite() || price_usd <= 0.0 {
            return None;
        }

        let (confidence, source) = if *tvl_usd >= self.min_pool_tvl_usd {
            (Confidence::High, "amm".to_string())
        } else if *tvl_usd >= LOW_TVL_CUTOFF_USD {
            (Confidence::Est, "amm:medium".to_string())
        } else {
            (Confidence::Est, "amm:low".to_string())
        };

        logger::debug(
            LogTag::Pool,
            &format!(
                "Pool {} priced {} at {:.12} USD (tvl ${:.0}, {})",
                best.address, mint, price_usd, tvl_usd, source
            ),
        );

        Some(PriceResult {
            mint: mint.to_string(),
            value_usd: None, // Market cap is attached by the resolver
            price_usd: Some(price_usd),
            confidence,
            source,
            supply: None,
            tvl_usd: Some(*tvl_usd),
            timestamp: Utc::now(),
        })
    }
}

/// Price of one base unit in quote units, decimal adjusted
fn pool_price(pool: &DecodedPool) -> Option<f64> {
    if pool.base_reserve <= 0.0 || pool.quote_reserve <= 0.0 {
        return None;
    }

    let base_ui = pool.base_reserve / 10f64.powi(pool.base_decimals as i32);
    let quote_ui = pool.quote_reserve / 10f64.powi(pool.quote_decimals as i32);
    if base_ui <= 0.0 || quote_ui <= 0.0 {
        return None;
    }

    Some(quote_ui / base_ui)
}

// =============================================================================
// LAYOUT DECODING
// =============================================================================

/// Decode a pool account, orienting reserves so `base` is `mint`
fn decode_pool(account: &PoolAccount, mint: &str) -> Option<DecodedPool> {
    match account.program {
        PoolProgram::ConstantProduct => decode_constant_product(account, mint),
        PoolProgram::BondingCurve => decode_bonding_curve(account, mint),
    }
}

fn decode_constant_product(account: &PoolAccount, mint: &str) -> Option<DecodedPool> {
    let data = &account.data;
    if data.len() < CP_MIN_DATA_LEN {
        return None;
    }

    let mint_a = pubkey_at(data, CP_BASE_MINT_OFFSET)?;
    let mint_b = pubkey_at(data, CP_QUOTE_MINT_OFFSET)?;
    let reserve_a = u64_at(data, CP_BASE_RESERVE_OFFSET)? as f64;
    let reserve_b = u64_at(data, CP_QUOTE_RESERVE_OFFSET)? as f64;
    let decimals_a = data[CP_BASE_DECIMALS_OFFSET];
    let decimals_b = data[CP_QUOTE_DECIMALS_OFFSET];

    orient(
        account, mint, &mint_a, &mint_b, reserve_a, reserve_b, reserve_a, reserve_b, decimals_a,
        decimals_b,
    )
}

fn decode_bonding_curve(account: &PoolAccount, mint: &str) -> Option<DecodedPool> {
    let data = &account.data;
    if data.len() < BC_MIN_DATA_LEN {
        return None;
    }

    let virtual_base = u64_at(data, BC_VIRTUAL_BASE_OFFSET)? as f64;
    let virtual_quote = u64_at(data, BC_VIRTUAL_QUOTE_OFFSET)? as f64;
    let real_base = u64_at(data, BC_REAL_BASE_OFFSET)? as f64;
    let real_quote = u64_at(data, BC_REAL_QUOTE_OFFSET)? as f64;
    let mint_a = pubkey_at(data, BC_BASE_MINT_OFFSET)?;
    let mint_b = pubkey_at(data, BC_QUOTE_MINT_OFFSET)?;
    let decimals_a = data[BC_BASE_DECIMALS_OFFSET];
    let decimals_b = data[BC_QUOTE_DECIMALS_OFFSET];

    // Virtual + real for the price ratio; real only for TVL
    orient(
        account,
        mint,
        &mint_a,
        &mint_b,
        virtual_base + real_base,
        virtual_quote + real_quote,
        real_base,
        real_quote,
        decimals_a,
        decimals_b,
    )
}

#[allow(clippy::too_many_arguments)]
fn orient(
    account: &PoolAccount,
    mint: &str,
    mint_a: &str,
    mint_b: &str,
    price_reserve_a: f64,
    price_reserve_b: f64,
    real_reserve_a: f64,
    real_reserve_b: f64,
    decimals_a: u8,
    decimals_b: u8,
) -> Option<DecodedPool> {
    if mint_a == mint {
        Some(DecodedPool {
            address: account.address.clone(),
            base_reserve: price_reserve_a,
            quote_reserve: price_reserve_b,
            real_quote_reserve: real_reserve_b,
            base_decimals: decimals_a,
            quote_decimals: decimals_b,
        })
    } else if mint_b == mint {
        Some(DecodedPool {
            address: account.address.clone(),
            base_reserve: price_reserve_b,
            quote_reserve: price_reserve_a,
            real_quote_reserve: real_reserve_a,
            base_decimals: decimals_b,
            quote_decimals: decimals_a,
        })
    } else {
        None
    }
}

fn pubkey_at(data: &[u8], offset: usize) -> Option<String> {
    let bytes = data.get(offset..offset + 32)?;
    Some(bs58::encode(bytes).into_string())
}

fn u64_at(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

#[cfg(test)]
pub mod test_support {
    //! Builders for synthetic pool accounts used across the price tests

    use super::*;

    pub fn constant_product_account(
        address: &str,
        base_mint: &str,
        quote_mint: &str,
        base_reserve: u64,
        quote_reserve: u64,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> PoolAccount {
        let mut data = vec![0u8; CP_MIN_DATA_LEN];
        write_pubkey(&mut data, CP_BASE_MINT_OFFSET, base_mint);
        write_pubkey(&mut data, CP_QUOTE_MINT_OFFSET, quote_mint);
        data[CP_BASE_RESERVE_OFFSET..CP_BASE_RESERVE_OFFSET + 8]
            .copy_from_slice(&base_reserve.to_le_bytes());
        data[CP_QUOTE_RESERVE_OFFSET..CP_QUOTE_RESERVE_OFFSET + 8]
            .copy_from_slice(&quote_reserve.to_le_bytes());
        data[CP_BASE_DECIMALS_OFFSET] = base_decimals;
        data[CP_QUOTE_DECIMALS_OFFSET] = quote_decimals;

        PoolAccount {
            address: address.to_string(),
            program: PoolProgram::ConstantProduct,
            data,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bonding_curve_account(
        address: &str,
        base_mint: &str,
        quote_mint: &str,
        virtual_base: u64,
        virtual_quote: u64,
        real_base: u64,
        real_quote: u64,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> PoolAccount {
        let mut data = vec![0u8; BC_MIN_DATA_LEN];
        data[BC_VIRTUAL_BASE_OFFSET..BC_VIRTUAL_BASE_OFFSET + 8]
            .copy_from_slice(&virtual_base.to_le_bytes());
        data[BC_VIRTUAL_QUOTE_OFFSET..BC_VIRTUAL_QUOTE_OFFSET + 8]
            .copy_from_slice(&virtual_quote.to_le_bytes());
        data[BC_REAL_BASE_OFFSET..BC_REAL_BASE_OFFSET + 8]
            .copy_from_slice(&real_base.to_le_bytes());
        data[BC_REAL_QUOTE_OFFSET..BC_REAL_QUOTE_OFFSET + 8]
            .copy_from_slice(&real_quote.to_le_bytes());
        write_pubkey(&mut data, BC_BASE_MINT_OFFSET, base_mint);
        write_pubkey(&mut data, BC_QUOTE_MINT_OFFSET, quote_mint);
        data[BC_BASE_DECIMALS_OFFSET] = base_decimals;
        data[BC_QUOTE_DECIMALS_OFFSET] = quote_decimals;

        PoolAccount {
            address: address.to_string(),
            program: PoolProgram::BondingCurve,
            data,
        }
    }

    fn write_pubkey(data: &mut [u8], offset: usize, mint: &str) {
        let decoded = bs58::decode(mint).into_vec().expect("valid base58 mint");
        data[offset..offset + 32].copy_from_slice(&decoded[..32]);
    }
}
