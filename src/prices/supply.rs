/// Token supply lookup shared by the fallback branches
///
/// Wraps the ledger's token-supply call with a per-process memo so the
/// cascade never asks twice for the same mint. The native token resolves
/// to its hardcoded fixed supply without touching the network.

use crate::constants::{is_native_mint, SOL_DECIMALS, SOL_FIXED_SUPPLY};
use crate::logger::{self, LogTag};
use crate::rpc::LedgerRpc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct SupplyInfo {
    pub supply: f64,
    pub decimals: u8,
}

pub struct SupplyResolver {
    rpc: Arc<dyn LedgerRpc>,
    memo: RwLock<HashMap<String, Option<SupplyInfo>>>,
}

impl SupplyResolver {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            rpc,
            memo: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, mint: &str) -> Option<SupplyInfo> {
        if is_native_mint(mint) {
            return Some(SupplyInfo {
                supply: SOL_FIXED_SUPPLY,
                decimals: SOL_DECIMALS,
            });
        }

        if let Some(cached) = self.memo.read().get(mint) {
            return *cached;
        }

        let resolved = match self.rpc.get_token_supply(mint).await {
            Ok(supply) => {
                let decimals = supply.decimals;
                supply.supply().map(|amount| SupplyInfo {
                    supply: amount,
                    decimals,
                })
            }
            Err(e) => {
                logger::debug(LogTag::Prices, &format!("Supply lookup failed for {}: {}", mint, e));
                None
            }
        };

        self.memo.write().insert(mint.to_string(), resolved);
        resolved
    }
}
