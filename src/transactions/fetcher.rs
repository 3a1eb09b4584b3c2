/// Batch transaction fetcher with adaptive concurrency
///
/// Signatures are grouped into fixed-size batches, each resolved with one
/// batched RPC round trip. Batches are issued concurrently in waves sized
/// by the [`AdaptiveLimiter`]: observed throttling shrinks the fan-out,
/// sustained clean batches grow it back. A batch-wide 429 backs off on the
/// fixed 5s/10s/20s ladder and retries the whole batch; a batch that stays
/// rate limited is skipped and counted, never escalated.

use crate::errors::{ApiError, WalletscopeError, WalletscopeResult};
use crate::logger::{self, LogTag};
use crate::rpc::throttle::{rate_limit_backoff, AdaptiveLimiter};
use crate::rpc::types::RawTransaction;
use crate::rpc::LedgerRpc;
use crate::transactions::{CancelFlag, ProgressFn};
use futures::future::join_all;
use std::sync::Arc;

/// Full-batch retries after a batch-wide 429 (the backoff ladder length)
const MAX_BATCH_ATTEMPTS: usize = 4;

/// Result of a batch fetch run, consumed by the extraction metrics
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Transaction bodies that survived the pre-filter
    pub transactions: Vec<RawTransaction>,
    /// Signatures whose bodies could not be resolved
    pub unresolved: usize,
    /// Bodies dropped by the pre-filter (no swap event, under two transfers)
    pub prefiltered: usize,
    /// Batches abandoned after exhausting the backoff ladder
    pub failed_batches: usize,
}

pub struct BatchFetcher {
    rpc: Arc<dyn LedgerRpc>,
    limiter: Arc<AdaptiveLimiter>,
    batch_size: usize,
}

impl BatchFetcher {
    pub fn new(rpc: Arc<dyn LedgerRpc>, limiter: Arc<AdaptiveLimiter>, batch_size: usize) -> Self {
        Self { rpc, limiter, batch_size }
    }

    /// Resolve bodies for all signatures. Arrival order is not preserved;
    /// the extractor's dedup map owns ordering-independent correctness.
    pub async fn fetch_bodies(
        &self,
        signatures: &[String],
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> WalletscopeResult<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        if signatures.is_empty() {
            return Ok(outcome);
        }

        let batches: Vec<&[String]> = signatures.chunks(self.batch_size).collect();
        let total_batches = batches.len();
        let mut completed = 0usize;
        let mut queue = batches.into_iter();

        loop {
            if cancel.is_cancelled() {
                return Err(WalletscopeError::Cancelled);
            }

            // Wave size follows the limiter as it adapts between waves
            let wave: Vec<&[String]> = queue.by_ref().take(self.limiter.limit()).collect();
            if wave.is_empty() {
                break;
            }

            let tasks: Vec<_> = wave
                .iter()
                .map(|batch| self.fetch_batch_with_backoff(batch))
                .collect();

            for result in join_all(tasks).await {
                match result {
                    Some(bodies) => {
                        let requested = bodies.len();
                        let mut resolved = 0usize;
                        for body in bodies.into_iter().flatten() {
                            resolved += 1;
                            if Self::is_swap_candidate(&body) {
                                outcome.transactions.push(body);
                            } else {
                                outcome.prefiltered += 1;
                            }
                        }
                        outcome.unresolved += requested.saturating_sub(resolved);
                    }
                    None => outcome.failed_batches += 1,
                }
                completed += 1;
            }

            progress.as_ref()(&format!(
                "Fetched batch {}/{} ({} candidate transactions)",
                completed,
                total_batches,
                outcome.transactions.len()
            ));
        }

        logger::info(
            LogTag::Fetch,
            &format!(
                "Batch fetch complete: {} candidates, {} pre-filtered, {} unresolved, {} failed batches",
                outcome.transactions.len(),
                outcome.prefiltered,
                outcome.unresolved,
                outcome.failed_batches
            ),
        );

        Ok(outcome)
    }

    /// One batch through the rate-limit ladder. Returns `None` when the
    /// batch had to be abandoned; the caller records it as a metric.
    async fn fetch_batch_with_backoff(
        &self,
        batch: &[String],
    ) -> Option<Vec<Option<RawTransaction>>> {
        for attempt in 0..MAX_BATCH_ATTEMPTS {
            match self.rpc.get_transactions(batch).await {
                Ok(bodies) => {
                    self.limiter.record_batch(0, batch.len());
                    return Some(bodies);
                }
                Err(ApiError::RateLimited) => {
                    // Batch-wide throttle: every request in it counts
                    self.limiter.record_batch(batch.len(), batch.len());

                    if attempt + 1 >= MAX_BATCH_ATTEMPTS {
                        break;
                    }
                    let delay = rate_limit_backoff(attempt);
                    logger::warning(
                        LogTag::Fetch,
                        &format!(
                            "Batch of {} rate limited, backing off {}s (attempt {}/{})",
                            batch.len(),
                            delay.as_secs(),
                            attempt + 1,
                            MAX_BATCH_ATTEMPTS
                        ),
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    // Transient failures were already retried by the client
                    logger::warning(
                        LogTag::Fetch,
                        &format!("Batch of {} failed: {}", batch.len(), e),
                    );
                    self.limiter.record_batch(0, batch.len());
                    return None;
                }
            }
        }

        logger::warning(
            LogTag::Fetch,
            &format!("Batch of {} abandoned after rate-limit backoff", batch.len()),
        );
        None
    }

    /// Pre-filter: keep a body only when it can plausibly yield a trade
    fn is_swap_candidate(tx: &RawTransaction) -> bool {
        tx.events.swap.is_some() || tx.token_transfers.len() >= 2
    }
}
