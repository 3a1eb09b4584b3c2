//! Price and market-cap resolution cascade
//!
//! For a token and optional historical point the resolver tries, in order:
//! the two-tier cache, the on-chain AMM reader, then the configured
//! off-chain providers. The first source to answer wins and its result is
//! cached under the (mint, calendar day) key so later requests - including
//! ones the ingestion pipeline has not reached yet - are served ahead of
//! recomputation.

pub mod amm;
pub mod providers;
pub mod supply;
pub mod types;

pub use amm::AmmReader;
pub use providers::{
    DexScreenerProvider, GeckoTerminalProvider, JupiterProvider, PriceProvider,
};
pub use supply::{SupplyInfo, SupplyResolver};
pub use types::{Confidence, PriceResult};

use crate::cache::{CacheKey, TieredCache};
use crate::config::{Config, ProviderKind};
use crate::constants::{is_native_mint, is_stable_mint, SOL_MINT, USDC_MINT};
use crate::logger::{self, LogTag};
use crate::rpc::LedgerRpc;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct PriceResolver {
    amm: AmmReader,
    providers: Vec<Arc<dyn PriceProvider>>,
    supply: Arc<SupplyResolver>,
    cache: Arc<TieredCache>,
}

impl PriceResolver {
    /// Wire up the cascade from configuration: AMM reader plus the
    /// off-chain providers in their configured fixed order.
    pub fn new(rpc: Arc<dyn LedgerRpc>, cache: Arc<TieredCache>, config: &Config) -> Self {
        let supply = Arc::new(SupplyResolver::new(rpc.clone()));

        let providers: Vec<Arc<dyn PriceProvider>> = config
            .provider_order
            .iter()
            .map(|kind| -> Arc<dyn PriceProvider> {
                match kind {
                    ProviderKind::DexScreener => Arc::new(DexScreenerProvider::new(
                        config.provider_timeout,
                        supply.clone(),
                    )),
                    ProviderKind::Jupiter => {
                        Arc::new(JupiterProvider::new(config.provider_timeout, supply.clone()))
                    }
                    ProviderKind::GeckoTerminal => Arc::new(GeckoTerminalProvider::new(
                        config.provider_timeout,
                        supply.clone(),
                    )),
                }
            })
            .collect();

        Self {
            amm: AmmReader::new(rpc, config.min_pool_tvl_usd),
            providers,
            supply,
            cache,
        }
    }

    /// Test/embedder constructor with explicit parts
    pub fn with_parts(
        amm: AmmReader,
        providers: Vec<Arc<dyn PriceProvider>>,
        supply: Arc<SupplyResolver>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self { amm, providers, supply, cache }
    }

    /// Resolve price and market cap for a mint, short-circuiting at the
    /// first source that answers. Never fails: when every source is out of
    /// opinions the result carries `Confidence::Unavailable`.
    pub async fn resolve(
        &self,
        mint: &str,
        quote: Option<&str>,
        at: Option<DateTime<Utc>>,
    ) -> PriceResult {
        let quote = quote.unwrap_or(USDC_MINT);

        // USD-stable tokens are their own price
        if is_stable_mint(mint) {
            let supply = self.supply.get(mint).await;
            return PriceResult {
                mint: mint.to_string(),
                value_usd: supply.map(|s| s.supply),
                price_usd: Some(1.0),
                confidence: Confidence::High,
                source: "stable".to_string(),
                supply: supply.map(|s| s.supply),
                tvl_usd: None,
                timestamp: at.unwrap_or_else(Utc::now),
            };
        }

        let key = CacheKey::new(mint, at.unwrap_or_else(Utc::now));
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        // On-chain first, except for the native token itself: SOL is the
        // pools' quote anchor and has to come from an off-chain source
        if !is_native_mint(mint) {
            if let Some(result) = self.resolve_on_chain(mint, quote, at).await {
                self.store(&key, &result);
                return result;
            }
        }

        for provider in &self.providers {
            if let Some(result) = provider.get(mint, quote, at).await {
                logger::debug(
                    LogTag::Prices,
                    &format!("{} priced {} via fallback", provider.name(), mint),
                );
                self.store(&key, &result);
                return result;
            }
        }

        logger::debug(LogTag::Prices, &format!("No price source available for {}", mint));
        PriceResult::unavailable(mint)
    }

    /// AMM branch: try the requested quote, then native-quoted pools,
    /// attaching market cap evidence from the supply lookup
    async fn resolve_on_chain(
        &self,
        mint: &str,
        quote: &str,
        at: Option<DateTime<Utc>>,
    ) -> Option<PriceResult> {
        let mut quotes = vec![quote.to_string()];
        if !is_native_mint(quote) {
            quotes.push(SOL_MINT.to_string());
        }

        for quote_mint in quotes {
            let accounts = match self.amm.fetch_pools(mint, &quote_mint).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    logger::debug(LogTag::Pool, &format!("Pool scan failed for {}: {}", mint, e));
                    continue;
                }
            };
            if accounts.is_empty() {
                continue;
            }

            // The quote anchor is only resolved once pools actually exist
            let Some(quote_price) = self.quote_price_usd(&quote_mint, at).await else {
                continue;
            };

            if let Some(mut result) = self.amm.price_from_accounts(mint, &accounts, quote_price) {
                if let Some(info) = self.supply.get(mint).await {
                    result.supply = Some(info.supply);
                    result.value_usd = result.price_usd.map(|p| p * info.supply);
                }
                if let Some(at) = at {
                    result.timestamp = at;
                }
                return Some(result);
            }
        }

        None
    }

    /// USD price of a quote leg: stables are 1.0, the native token is
    /// resolved through the cascade itself (cache, then providers)
    async fn quote_price_usd(&self, quote: &str, at: Option<DateTime<Utc>>) -> Option<f64> {
        if is_stable_mint(quote) {
            return Some(1.0);
        }
        if is_native_mint(quote) {
            let result = Box::pin(self.resolve(SOL_MINT, Some(USDC_MINT), at)).await;
            return result.price_usd.filter(|p| *p > 0.0);
        }
        None
    }

    fn store(&self, key: &CacheKey, result: &PriceResult) {
        // Unavailable results are never cached; a later run should retry
        if result.is_available() {
            self.cache.set(key, result);
        }
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, ApiResult};
    use crate::rpc::types::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    struct EmptyRpc;

    #[async_trait]
    impl LedgerRpc for EmptyRpc {
        async fn get_signatures(
            &self,
            _wallet: &str,
            _limit: usize,
            _before: Option<&str>,
        ) -> ApiResult<SignaturePage> {
            Ok(SignaturePage::default())
        }

        async fn get_transactions(
            &self,
            _signatures: &[String],
        ) -> ApiResult<Vec<Option<RawTransaction>>> {
            Ok(Vec::new())
        }

        async fn get_token_supply(&self, _mint: &str) -> ApiResult<TokenSupply> {
            Err(ApiError::NotFound)
        }

        async fn get_pool_accounts(
            &self,
            _mint: &str,
            _quote: &str,
        ) -> ApiResult<Vec<PoolAccount>> {
            Ok(Vec::new())
        }
    }

    /// Provider that records whether it was called and answers on demand
    struct ScriptedProvider {
        name: &'static str,
        answer: Option<f64>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl PriceProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn get(
            &self,
            mint: &str,
            _quote: &str,
            at: Option<DateTime<Utc>>,
        ) -> Option<PriceResult> {
            *self.calls.lock() += 1;
            let price = self.answer?;
            Some(PriceResult {
                mint: mint.to_string(),
                value_usd: Some(price * 1000.0),
                price_usd: Some(price),
                confidence: Confidence::Est,
                source: self.name.to_string(),
                supply: Some(1000.0),
                tvl_usd: None,
                timestamp: at.unwrap_or_else(Utc::now),
            })
        }
    }

    fn resolver_with(
        providers: Vec<Arc<ScriptedProvider>>,
    ) -> (PriceResolver, Vec<Arc<ScriptedProvider>>) {
        let rpc: Arc<dyn LedgerRpc> = Arc::new(EmptyRpc);
        let cache = Arc::new(TieredCache::memory_only(100));
        let supply = Arc::new(SupplyResolver::new(rpc.clone()));
        let dyn_providers: Vec<Arc<dyn PriceProvider>> = providers
            .iter()
            .map(|p| p.clone() as Arc<dyn PriceProvider>)
            .collect();
        let resolver = PriceResolver::with_parts(
            AmmReader::new(rpc, 5_000.0),
            dyn_providers,
            supply,
            cache,
        );
        (resolver, providers)
    }

    #[tokio::test]
    async fn test_fallbacks_tried_in_fixed_order() {
        let first = Arc::new(ScriptedProvider {
            name: "first",
            answer: None,
            calls: Mutex::new(0),
        });
        let second = Arc::new(ScriptedProvider {
            name: "second",
            answer: Some(2.0),
            calls: Mutex::new(0),
        });
        let third = Arc::new(ScriptedProvider {
            name: "third",
            answer: Some(3.0),
            calls: Mutex::new(0),
        });

        let (resolver, providers) =
            resolver_with(vec![first.clone(), second.clone(), third.clone()]);
        let result = resolver.resolve(MINT, None, None).await;

        // Second answers, third is never consulted
        assert_eq!(result.source, "second");
        assert_eq!(result.price_usd, Some(2.0));
        assert_eq!(*providers[0].calls.lock(), 1);
        assert_eq!(*providers[1].calls.lock(), 1);
        assert_eq!(*providers[2].calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_amm_success_short_circuits_fallbacks() {
        use crate::prices::amm::test_support::constant_product_account;

        struct PoolRpc;

        #[async_trait]
        impl LedgerRpc for PoolRpc {
            async fn get_signatures(
                &self,
                _wallet: &str,
                _limit: usize,
                _before: Option<&str>,
            ) -> ApiResult<SignaturePage> {
                Ok(SignaturePage::default())
            }

            async fn get_transactions(
                &self,
                _signatures: &[String],
            ) -> ApiResult<Vec<Option<RawTransaction>>> {
                Ok(Vec::new())
            }

            async fn get_token_supply(&self, _mint: &str) -> ApiResult<TokenSupply> {
                Ok(TokenSupply {
                    amount: "1000000000000".to_string(),
                    decimals: 6,
                    ui_amount: None,
                })
            }

            async fn get_pool_accounts(
                &self,
                _mint: &str,
                _quote: &str,
            ) -> ApiResult<Vec<PoolAccount>> {
                // 1,000,000 tokens against 2,000,000 USDC: $2 each,
                // TVL $4M, far over the floor
                Ok(vec![constant_product_account(
                    "deep-pool",
                    MINT,
                    USDC_MINT,
                    1_000_000_000_000,
                    2_000_000_000_000,
                    6,
                    6,
                )])
            }
        }

        let fallback = Arc::new(ScriptedProvider {
            name: "fallback",
            answer: Some(99.0),
            calls: Mutex::new(0),
        });

        let rpc: Arc<dyn LedgerRpc> = Arc::new(PoolRpc);
        let cache = Arc::new(TieredCache::memory_only(100));
        let supply = Arc::new(SupplyResolver::new(rpc.clone()));
        let resolver = PriceResolver::with_parts(
            AmmReader::new(rpc, 5_000.0),
            vec![fallback.clone() as Arc<dyn PriceProvider>],
            supply,
            cache,
        );

        let result = resolver.resolve(MINT, None, None).await;

        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.source, "amm");
        assert!((result.price_usd.unwrap() - 2.0).abs() < 1e-9);
        // Market cap attached from the supply lookup
        assert!((result.value_usd.unwrap() - 2_000_000.0).abs() < 1e-3);
        // No off-chain provider was consulted
        assert_eq!(*fallback.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_all_sources_fail_is_unavailable() {
        let only = Arc::new(ScriptedProvider {
            name: "only",
            answer: None,
            calls: Mutex::new(0),
        });
        let (resolver, _) = resolver_with(vec![only]);

        let result = resolver.resolve(MINT, None, None).await;
        assert_eq!(result.confidence, Confidence::Unavailable);
        assert_eq!(result.price_usd, None);
        assert_eq!(result.value_usd, None);
    }

    #[tokio::test]
    async fn test_successful_result_is_cached() {
        let provider = Arc::new(ScriptedProvider {
            name: "cachedsource",
            answer: Some(5.0),
            calls: Mutex::new(0),
        });
        let (resolver, providers) = resolver_with(vec![provider]);

        let first = resolver.resolve(MINT, None, None).await;
        let second = resolver.resolve(MINT, None, None).await;

        assert_eq!(first.price_usd, second.price_usd);
        // Second resolve was answered by the cache
        assert_eq!(*providers[0].calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_cached() {
        let provider = Arc::new(ScriptedProvider {
            name: "flaky",
            answer: None,
            calls: Mutex::new(0),
        });
        let (resolver, providers) = resolver_with(vec![provider]);

        let _ = resolver.resolve(MINT, None, None).await;
        let _ = resolver.resolve(MINT, None, None).await;

        // Both resolves reached the provider: no negative caching
        assert_eq!(*providers[0].calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_stable_mint_is_its_own_price() {
        let (resolver, _) = resolver_with(Vec::new());
        let result = resolver.resolve(USDC_MINT, None, None).await;

        assert_eq!(result.price_usd, Some(1.0));
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.source, "stable");
    }
}
