/// Environment-backed configuration for the pipeline
///
/// Every knob has a safe default except the ledger RPC API key, whose
/// absence fails fast with a clear error before any network call is made.
/// The config is constructed once and owned by the service object; nothing
/// here is a global.

use crate::errors::WalletscopeError;
use crate::logger::{self, LogTag};
use std::env;
use std::time::Duration;

// =============================================================================
// DEFAULTS
// =============================================================================

const DEFAULT_RPC_URL: &str = "https://mainnet.helius-rpc.com";
const DEFAULT_SIGNATURE_PAGE_SIZE: usize = 1_000;
const DEFAULT_TX_BATCH_SIZE: usize = 100;
const DEFAULT_FETCH_CONCURRENCY: usize = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CACHE_DB_PATH: &str = "walletscope_cache.db";
const DEFAULT_CACHE_TTL_DAYS: i64 = 30;
const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 1_000;

/// Hard bounds for the adaptive fan-out limiter
pub const FETCH_CONCURRENCY_FLOOR: usize = 5;
pub const FETCH_CONCURRENCY_CEILING: usize = 50;

/// Off-chain price providers the cascade can be ordered over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    DexScreener,
    Jupiter,
    GeckoTerminal,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DexScreener => "dexscreener",
            ProviderKind::Jupiter => "jupiter",
            ProviderKind::GeckoTerminal => "geckoterminal",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dexscreener" => Some(ProviderKind::DexScreener),
            "jupiter" => Some(ProviderKind::Jupiter),
            "geckoterminal" => Some(ProviderKind::GeckoTerminal),
            _ => None,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// API key appended to every RPC call (required)
    pub rpc_api_key: String,
    /// Signatures requested per pagination page
    pub signature_page_size: usize,
    /// Signatures per batched transaction lookup
    pub tx_batch_size: usize,
    /// Initial fan-out for concurrent batch fetches (adaptively tuned)
    pub fetch_concurrency: usize,
    /// Per-call timeout for ledger RPC requests
    pub http_timeout: Duration,
    /// Per-call timeout for off-chain price providers
    pub provider_timeout: Duration,
    /// Minimum pool TVL in USD for a high-confidence on-chain price
    pub min_pool_tvl_usd: f64,
    /// Path of the durable cache database
    pub cache_db_path: String,
    /// TTL for durable cache entries, in days
    pub cache_ttl_days: i64,
    /// Capacity of the in-process price cache
    pub memory_cache_capacity: usize,
    /// Fixed order the off-chain fallbacks are tried in
    pub provider_order: Vec<ProviderKind>,
}

impl Config {
    /// Build a config from the environment.
    ///
    /// Fails only when the API key is missing; every other variable falls
    /// back to its default (invalid values log a warning and use the default).
    pub fn from_env() -> Result<Self, WalletscopeError> {
        let rpc_api_key = env::var("WALLETSCOPE_RPC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(WalletscopeError::MissingApiKey)?;

        let config = Self {
            rpc_url: env_or("WALLETSCOPE_RPC_URL", DEFAULT_RPC_URL.to_string()),
            rpc_api_key,
            signature_page_size: env_parsed(
                "WALLETSCOPE_SIGNATURE_PAGE_SIZE",
                DEFAULT_SIGNATURE_PAGE_SIZE,
            ),
            tx_batch_size: env_parsed("WALLETSCOPE_TX_BATCH_SIZE", DEFAULT_TX_BATCH_SIZE),
            fetch_concurrency: env_parsed(
                "WALLETSCOPE_FETCH_CONCURRENCY",
                DEFAULT_FETCH_CONCURRENCY,
            )
            .clamp(FETCH_CONCURRENCY_FLOOR, FETCH_CONCURRENCY_CEILING),
            http_timeout: Duration::from_secs(env_parsed(
                "WALLETSCOPE_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            provider_timeout: Duration::from_secs(env_parsed(
                "WALLETSCOPE_PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )),
            min_pool_tvl_usd: env_parsed(
                "WALLETSCOPE_MIN_POOL_TVL_USD",
                crate::constants::DEFAULT_MIN_POOL_TVL_USD,
            ),
            cache_db_path: env_or("WALLETSCOPE_CACHE_DB", DEFAULT_CACHE_DB_PATH.to_string()),
            cache_ttl_days: env_parsed("WALLETSCOPE_CACHE_TTL_DAYS", DEFAULT_CACHE_TTL_DAYS),
            memory_cache_capacity: env_parsed(
                "WALLETSCOPE_MEMORY_CACHE_CAPACITY",
                DEFAULT_MEMORY_CACHE_CAPACITY,
            ),
            provider_order: parse_provider_order(
                env::var("WALLETSCOPE_PROVIDER_ORDER").ok().as_deref(),
            ),
        };

        Ok(config)
    }

    /// Config with defaults and an explicit key. Used by tests and embedders.
    pub fn with_api_key(api_key: &str) -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rpc_api_key: api_key.to_string(),
            signature_page_size: DEFAULT_SIGNATURE_PAGE_SIZE,
            tx_batch_size: DEFAULT_TX_BATCH_SIZE,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            min_pool_tvl_usd: crate::constants::DEFAULT_MIN_POOL_TVL_USD,
            cache_db_path: DEFAULT_CACHE_DB_PATH.to_string(),
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
            memory_cache_capacity: DEFAULT_MEMORY_CACHE_CAPACITY,
            provider_order: parse_provider_order(None),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn env_or(key: &str, default: String) -> String {
    env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                logger::warning(
                    LogTag::Config,
                    &format!("Invalid value for {}: '{}', using default", key, raw),
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse the provider cascade order; unknown names are dropped with a
/// warning, duplicates keep their first position, and an empty result
/// falls back to the default order.
fn parse_provider_order(raw: Option<&str>) -> Vec<ProviderKind> {
    let default_order = vec![
        ProviderKind::DexScreener,
        ProviderKind::Jupiter,
        ProviderKind::GeckoTerminal,
    ];

    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return default_order,
    };

    let mut order = Vec::new();
    for part in raw.split(',') {
        match ProviderKind::parse(part) {
            Some(kind) if !order.contains(&kind) => order.push(kind),
            Some(_) => {}
            None => logger::warning(
                LogTag::Config,
                &format!("Unknown price provider '{}' in WALLETSCOPE_PROVIDER_ORDER", part.trim()),
            ),
        }
    }

    if order.is_empty() {
        default_order
    } else {
        order
    }
}
