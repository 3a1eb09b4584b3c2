/// Pipeline facade
///
/// `WalletScope` owns every collaborator - config, ledger transport, the
/// two-tier cache, the price cascade and the adaptive limiter - and is
/// constructed once at process start, then passed by handle to whatever
/// needs it. The serving layer talks to this type only.

use crate::cache::{CacheKey, CacheStats, TieredCache};
use crate::config::Config;
use crate::errors::{WalletscopeError, WalletscopeResult, MAX_MARKET_CAP_BATCH};
use crate::logger::{self, LogTag};
use crate::pnl::{compute_unrealized, FifoLedger, UnrealizedPnl};
use crate::prices::{PriceResolver, PriceResult};
use crate::rpc::{
    validate_wallet_address, AdaptiveLimiter, LedgerClient, LedgerRpc, ThrottleStats,
};
use crate::stream::{event_channel, StreamEvent, StreamHandle, StreamProducer};
use crate::trades::{
    ExtractionMetrics, Trade, TradeAction, TradeExtractor, TradeReport, TradeSummary,
};
use crate::transactions::{BatchFetcher, CancelFlag, ProgressFn, SignaturePaginator};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// OPTIONS AND RESULTS
// =============================================================================

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Run the price cascade per trade (disable for a fast raw pass)
    pub price_trades: bool,
    /// Quote mint override for pool pricing
    pub quote_mint: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            price_trades: true,
            quote_mint: None,
        }
    }
}

/// Pipeline phases, used to label progress checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Signatures,
    Transactions,
    Extraction,
    Pricing,
    Complete,
}

impl Phase {
    fn step(&self) -> &'static str {
        match self {
            Phase::Signatures => "signatures",
            Phase::Transactions => "transactions",
            Phase::Extraction => "extraction",
            Phase::Pricing => "pricing",
            Phase::Complete => "complete",
        }
    }

    fn percentage(&self) -> f64 {
        match self {
            Phase::Signatures => 15.0,
            Phase::Transactions => 45.0,
            Phase::Extraction => 60.0,
            Phase::Pricing => 85.0,
            Phase::Complete => 100.0,
        }
    }
}

type PhaseProgressFn = Arc<dyn Fn(Phase, &str) + Send + Sync>;

/// Aggregate service statistics for the query surface
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub throttle: ThrottleStats,
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct WalletScope {
    config: Config,
    rpc: Arc<dyn LedgerRpc>,
    cache: Arc<TieredCache>,
    resolver: Arc<PriceResolver>,
    limiter: Arc<AdaptiveLimiter>,
}

impl WalletScope {
    /// Construct the service against the production ledger client
    pub fn new(config: Config) -> WalletscopeResult<Self> {
        let client = LedgerClient::new(&config)
            .map_err(|e| WalletscopeError::Config(e.to_string()))?;
        let rpc: Arc<dyn LedgerRpc> = Arc::new(client);
        Ok(Self::with_rpc(config, rpc))
    }

    /// Construct with an injected transport (tests, embedders)
    pub fn with_rpc(config: Config, rpc: Arc<dyn LedgerRpc>) -> Self {
        let cache = Arc::new(TieredCache::new(
            &config.cache_db_path,
            config.cache_ttl_days,
            config.memory_cache_capacity,
        ));
        let resolver = Arc::new(PriceResolver::new(rpc.clone(), cache.clone(), &config));
        let limiter = Arc::new(AdaptiveLimiter::new(config.fetch_concurrency));

        Self {
            config,
            rpc,
            cache,
            resolver,
            limiter,
        }
    }

    /// Start lifecycle hook: prune the durable cache and announce
    pub fn start(&self) {
        let stats = self.cache.stats();
        logger::info(
            LogTag::System,
            &format!(
                "walletscope started (cache: {} memory entries, durable tier {})",
                stats.memory_entries,
                if stats.durable_entries.is_some() { "online" } else { "offline" }
            ),
        );
    }

    /// Stop lifecycle hook: report final statistics
    pub fn stop(&self) {
        let stats = self.service_stats();
        logger::info(
            LogTag::System,
            &format!(
                "walletscope stopped (batches: {}, throttled: {}, cache hits: {})",
                stats.throttle.total_batches,
                stats.throttle.throttled_batches,
                stats.cache.durable_hits + stats.cache.memory_hits
            ),
        );
    }

    // =========================================================================
    // TOP-LEVEL FETCH
    // =========================================================================

    /// Run the full pipeline for a wallet and return the result envelope.
    /// `progress` receives human-readable status lines at checkpoints.
    pub async fn fetch_wallet_trades(
        &self,
        wallet: &str,
        options: FetchOptions,
        progress: Option<ProgressFn>,
        cancel: Option<CancelFlag>,
    ) -> WalletscopeResult<TradeReport> {
        let (report, _ledger) = self
            .run_pipeline(wallet, options, plain_progress(progress), cancel.unwrap_or_default())
            .await?;
        Ok(report)
    }

    /// Full pipeline plus unrealized P&L over the remaining open positions
    pub async fn fetch_wallet_overview(
        &self,
        wallet: &str,
        options: FetchOptions,
        price_overrides: &HashMap<String, f64>,
    ) -> WalletscopeResult<(TradeReport, Vec<UnrealizedPnl>)> {
        let (report, ledger) = self
            .run_pipeline(wallet, options, plain_progress(None), CancelFlag::new())
            .await?;

        let open = ledger.open_positions();
        let unrealized = compute_unrealized(&open, &self.resolver, price_overrides).await;

        Ok((report, unrealized))
    }

    async fn run_pipeline(
        &self,
        wallet: &str,
        options: FetchOptions,
        progress: PhaseProgressFn,
        cancel: CancelFlag,
    ) -> WalletscopeResult<(TradeReport, FifoLedger)> {
        if !validate_wallet_address(wallet) {
            return Err(WalletscopeError::InvalidWallet(wallet.to_string()));
        }

        let started = Instant::now();
        let mut metrics = ExtractionMetrics::new();
        let notify = progress.as_ref();

        logger::info(LogTag::System, &format!("Fetching trades for wallet {}", wallet));

        // 1. Walk the signature listing to completion
        let paginator = SignaturePaginator::new(self.rpc.clone(), self.config.signature_page_size);
        let signatures = paginator.fetch_all(wallet, &cancel).await?;
        metrics.signatures_fetched = signatures.len() as u64;
        notify(
            Phase::Signatures,
            &format!("Found {} signatures ({:.1}s)", signatures.len(), started.elapsed().as_secs_f64()),
        );

        // 2. Resolve bodies in adaptive concurrent batches
        let fetcher =
            BatchFetcher::new(self.rpc.clone(), self.limiter.clone(), self.config.tx_batch_size);
        let batch_progress: ProgressFn = {
            let progress = progress.clone();
            Arc::new(move |msg: &str| progress.as_ref()(Phase::Transactions, msg))
        };
        let signature_ids: Vec<String> =
            signatures.iter().map(|s| s.signature.clone()).collect();
        let outcome = fetcher.fetch_bodies(&signature_ids, &cancel, &batch_progress).await?;
        metrics.prefiltered = outcome.prefiltered as u64;
        metrics.unresolved_transactions = outcome.unresolved as u64;
        metrics.failed_batches = outcome.failed_batches as u64;

        // 3. Extract, dedup, dust-filter
        let mut trades = TradeExtractor::extract(&outcome.transactions, wallet, &mut metrics);
        notify(
            Phase::Extraction,
            &format!("Extracted {} trades ({:.1}s)", trades.len(), started.elapsed().as_secs_f64()),
        );

        if cancel.is_cancelled() {
            return Err(WalletscopeError::Cancelled);
        }

        // 4. Price each trade through the cascade
        if options.price_trades {
            self.price_trades(&mut trades, &options, &mut metrics).await;
            notify(
                Phase::Pricing,
                &format!(
                    "Priced {}/{} trades ({:.1}s)",
                    trades.iter().filter(|t| t.priced).count(),
                    trades.len(),
                    started.elapsed().as_secs_f64()
                ),
            );
        }

        if cancel.is_cancelled() {
            return Err(WalletscopeError::Cancelled);
        }

        // 5. FIFO realized P&L, inline over the chronological trade list
        let mut ledger = FifoLedger::new(wallet);
        for trade in trades.iter_mut() {
            ledger.apply(trade);
        }

        let report = build_report(wallet, &trades, started.elapsed().as_secs_f64(), &metrics);
        notify(
            Phase::Complete,
            &format!(
                "Complete: {} trades, {:.2} USD realized ({:.1}s)",
                report.summary.total_trades,
                report.summary.total_pnl_usd,
                report.elapsed_seconds
            ),
        );

        Ok((report, ledger))
    }

    /// Fill price, value and fee fields on every trade
    async fn price_trades(
        &self,
        trades: &mut [Trade],
        options: &FetchOptions,
        metrics: &mut ExtractionMetrics,
    ) {
        if trades.is_empty() {
            return;
        }

        // One native price anchors all fee conversions
        let sol_price = self
            .resolver
            .resolve(crate::constants::SOL_MINT, None, None)
            .await
            .price_usd;

        for trade in trades.iter_mut() {
            let token = trade.token_side().clone();
            let result = self
                .resolver
                .resolve(&token.mint, options.quote_mint.as_deref(), Some(trade.timestamp))
                .await;

            match result.price_usd {
                Some(price) => {
                    trade.price_usd = Some(price);
                    trade.value_usd = Some(price * token.amount);
                    trade.priced = true;
                }
                None => {
                    metrics.unpriced_trades += 1;
                }
            }

            if let Some(sol_price) = sol_price {
                trade.fees_usd = (trade.fee_lamports as f64)
                    / (crate::constants::LAMPORTS_PER_SOL as f64)
                    * sol_price;
            }
        }
    }

    // =========================================================================
    // STREAMING VARIANT
    // =========================================================================

    /// Streaming pipeline: returns a handle whose receiver yields typed
    /// events suitable for SSE framing. Firing the handle's cancel flag
    /// aborts the run before partial results are exposed.
    pub fn stream_wallet_trades(
        self: &Arc<Self>,
        wallet: &str,
        options: FetchOptions,
    ) -> StreamHandle {
        let cancel = CancelFlag::new();
        let (producer, handle) = event_channel(cancel.clone());
        let producer = Arc::new(producer);

        let service = self.clone();
        let wallet = wallet.to_string();

        tokio::spawn(async move {
            producer.emit(StreamEvent::Connected);

            let phase_producer = producer.clone();
            let progress: PhaseProgressFn = Arc::new(move |phase: Phase, message: &str| {
                phase_producer.emit(StreamEvent::Progress {
                    message: message.to_string(),
                    percentage: phase.percentage(),
                    step: phase.step().to_string(),
                });
            });

            match service
                .run_pipeline(&wallet, options, progress, cancel.clone())
                .await
            {
                Ok((report, _ledger)) => {
                    emit_report(&producer, &wallet, report);
                }
                Err(e) => {
                    producer.emit(StreamEvent::Error {
                        message: e.to_string(),
                        code: error_code(&e).to_string(),
                    });
                }
            }
        });

        handle
    }

    // =========================================================================
    // MARKET-CAP QUERY SURFACE
    // =========================================================================

    /// Single market-cap lookup, cache-first
    pub async fn get_market_cap(
        &self,
        mint: &str,
        at: Option<DateTime<Utc>>,
    ) -> PriceResult {
        self.resolver.resolve(mint, None, at).await
    }

    /// Batch lookup of up to 50 mints: one cache round trip, then the
    /// cascade for the misses
    pub async fn get_market_caps(
        &self,
        mints: &[String],
        at: Option<DateTime<Utc>>,
    ) -> WalletscopeResult<HashMap<String, PriceResult>> {
        if mints.len() > MAX_MARKET_CAP_BATCH {
            return Err(WalletscopeError::BatchTooLarge(mints.len()));
        }

        let stamp = at.unwrap_or_else(Utc::now);
        let keys: Vec<CacheKey> = mints.iter().map(|m| CacheKey::new(m, stamp)).collect();
        let cached = self.cache.get_batch(&keys);

        let mut results: HashMap<String, PriceResult> = cached
            .into_iter()
            .map(|(key, value)| (key.mint, value))
            .collect();

        for mint in mints {
            if results.contains_key(mint) {
                continue;
            }
            let resolved = self.resolver.resolve(mint, None, at).await;
            results.insert(mint.clone(), resolved);
        }

        Ok(results)
    }

    pub fn service_stats(&self) -> ServiceStats {
        ServiceStats {
            cache: self.cache.stats(),
            throttle: self.limiter.stats(),
        }
    }

    pub fn resolver(&self) -> &PriceResolver {
        &self.resolver
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Adapt an optional plain string callback into the phase-aware form
fn plain_progress(progress: Option<ProgressFn>) -> PhaseProgressFn {
    match progress {
        Some(callback) => Arc::new(move |_phase, message: &str| callback.as_ref()(message)),
        None => Arc::new(|_, _| {}),
    }
}

fn build_report(
    wallet: &str,
    trades: &[Trade],
    elapsed_seconds: f64,
    metrics: &ExtractionMetrics,
) -> TradeReport {
    let priced_trades = trades.iter().filter(|t| t.priced).count();
    let total_pnl_usd: f64 = trades.iter().map(|t| t.pnl_usd).sum();

    let priced_sells: Vec<&Trade> = trades
        .iter()
        .filter(|t| t.priced && t.action() == TradeAction::Sell)
        .collect();
    let win_rate = if priced_sells.is_empty() {
        0.0
    } else {
        let wins = priced_sells.iter().filter(|t| t.pnl_usd > 0.0).count();
        (wins as f64) / (priced_sells.len() as f64) * 100.0
    };

    TradeReport {
        wallet: wallet.to_string(),
        from_slot: trades.first().map(|t| t.slot).unwrap_or(0),
        to_slot: trades.last().map(|t| t.slot).unwrap_or(0),
        elapsed_seconds,
        summary: TradeSummary {
            total_trades: trades.len(),
            total_pnl_usd,
            win_rate,
            priced_trades,
            metrics: metrics.to_json(),
        },
        trades: trades.iter().map(|t| t.to_wire()).collect(),
    }
}

/// Emit the terminal event sequence for a completed run
fn emit_report(producer: &StreamProducer, wallet: &str, report: TradeReport) {
    producer.emit(StreamEvent::Metadata {
        wallet: wallet.to_string(),
        total_signatures: report.summary.metrics["signatures_fetched"]
            .as_u64()
            .unwrap_or(0) as usize,
    });

    for batch in report.trades.chunks(50) {
        producer.emit(StreamEvent::Trades {
            batch: batch.to_vec(),
        });
    }

    producer.emit(StreamEvent::Complete {
        summary: report.summary,
    });
}

fn error_code(error: &WalletscopeError) -> &'static str {
    match error {
        WalletscopeError::MissingApiKey => "missing_api_key",
        WalletscopeError::InvalidWallet(_) => "invalid_wallet",
        WalletscopeError::PaginationTruncated { .. } => "truncation",
        WalletscopeError::Cancelled => "cancelled",
        WalletscopeError::BatchTooLarge(_) => "batch_too_large",
        WalletscopeError::Config(_) => "config",
    }
}
