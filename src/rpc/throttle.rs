//! Adaptive fan-out tuning and backoff for the batch fetch path
//!
//! The limiter is the single piece of cross-task shared mutable state in the
//! fetch pipeline. Concurrent batches report their outcome through
//! `record_batch`, which performs the read-modify-write of the fan-out limit
//! under one lock.

use crate::config::{FETCH_CONCURRENCY_CEILING, FETCH_CONCURRENCY_FLOOR};
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::time::Duration;

/// Throttle rate above which the fan-out limit shrinks
const SHRINK_THRESHOLD: f64 = 0.05;
/// Shrink factor applied when the upstream pushes back
const SHRINK_FACTOR: f64 = 0.8;
/// Growth factor applied after a clean streak
const GROW_FACTOR: f64 = 1.1;
/// Clean batches required before the limit grows
const CLEAN_STREAK_FOR_GROWTH: u32 = 3;

/// Fixed backoff ladder for a batch-wide 429 (seconds)
const RATE_LIMIT_BACKOFF_SECS: [u64; 3] = [5, 10, 20];

/// Backoff delay for the given retry attempt (0-based), saturating at the
/// top of the ladder
pub fn rate_limit_backoff(attempt: usize) -> Duration {
    let idx = attempt.min(RATE_LIMIT_BACKOFF_SECS.len() - 1);
    Duration::from_secs(RATE_LIMIT_BACKOFF_SECS[idx])
}

// =============================================================================
// ADAPTIVE LIMITER
// =============================================================================

/// Snapshot of limiter activity, surfaced in service statistics
#[derive(Debug, Clone, Default)]
pub struct ThrottleStats {
    pub total_batches: u64,
    pub throttled_batches: u64,
    pub current_limit: usize,
    pub grows: u64,
    pub shrinks: u64,
}

#[derive(Debug)]
struct LimiterState {
    limit: usize,
    clean_streak: u32,
    total_batches: u64,
    throttled_batches: u64,
    grows: u64,
    shrinks: u64,
}

/// Self-tuning concurrency limit for batch transaction fetches.
///
/// Shrinks 20% when more than 5% of a batch's requests were throttled,
/// grows 10% after three consecutive clean batches. The limit never leaves
/// `[FETCH_CONCURRENCY_FLOOR, FETCH_CONCURRENCY_CEILING]`.
pub struct AdaptiveLimiter {
    state: Mutex<LimiterState>,
}

impl AdaptiveLimiter {
    pub fn new(initial_limit: usize) -> Self {
        let limit = initial_limit.clamp(FETCH_CONCURRENCY_FLOOR, FETCH_CONCURRENCY_CEILING);
        Self {
            state: Mutex::new(LimiterState {
                limit,
                clean_streak: 0,
                total_batches: 0,
                throttled_batches: 0,
                grows: 0,
                shrinks: 0,
            }),
        }
    }

    /// Current fan-out limit
    pub fn limit(&self) -> usize {
        self.state.lock().limit
    }

    /// Record a completed batch: how many of its requests were throttled
    /// out of how many were attempted. Adjusts the limit atomically.
    pub fn record_batch(&self, throttled: usize, total: usize) {
        if total == 0 {
            return;
        }

        let mut state = self.state.lock();
        state.total_batches += 1;

        let throttle_rate = (throttled as f64) / (total as f64);

        if throttle_rate > SHRINK_THRESHOLD {
            state.throttled_batches += 1;
            state.clean_streak = 0;

            let new_limit = (((state.limit as f64) * SHRINK_FACTOR).floor() as usize)
                .max(FETCH_CONCURRENCY_FLOOR);
            if new_limit < state.limit {
                logger::debug(
                    LogTag::Fetch,
                    &format!(
                        "Throttle rate {:.1}% over threshold, fan-out {} -> {}",
                        throttle_rate * 100.0,
                        state.limit,
                        new_limit
                    ),
                );
                state.limit = new_limit;
                state.shrinks += 1;
            }
        } else if throttled == 0 {
            state.clean_streak += 1;

            if state.clean_streak >= CLEAN_STREAK_FOR_GROWTH {
                state.clean_streak = 0;

                let new_limit = (((state.limit as f64) * GROW_FACTOR).ceil() as usize)
                    .min(FETCH_CONCURRENCY_CEILING);
                if new_limit > state.limit {
                    logger::debug(
                        LogTag::Fetch,
                        &format!("Clean streak, fan-out {} -> {}", state.limit, new_limit),
                    );
                    state.limit = new_limit;
                    state.grows += 1;
                }
            }
        } else {
            // Some throttling but under threshold: neither grow nor shrink
            state.clean_streak = 0;
        }
    }

    pub fn stats(&self) -> ThrottleStats {
        let state = self.state.lock();
        ThrottleStats {
            total_batches: state.total_batches,
            throttled_batches: state.throttled_batches,
            current_limit: state.limit,
            grows: state.grows,
            shrinks: state.shrinks,
        }
    }
}

// =============================================================================
// EXPONENTIAL BACKOFF
// =============================================================================

/// Exponential backoff calculator for transient RPC failures
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay }
    }

    /// Delay for a specific attempt: 2^attempt * base_delay, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt.min(10));
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_never_leaves_bounds() {
        let limiter = AdaptiveLimiter::new(10);

        // Hammer with fully throttled batches
        for _ in 0..100 {
            limiter.record_batch(10, 10);
        }
        assert_eq!(limiter.limit(), FETCH_CONCURRENCY_FLOOR);

        // Then a long clean streak
        for _ in 0..500 {
            limiter.record_batch(0, 10);
        }
        assert_eq!(limiter.limit(), FETCH_CONCURRENCY_CEILING);
    }

    #[test]
    fn test_shrink_on_throttle_rate() {
        let limiter = AdaptiveLimiter::new(20);
        // 10% throttled > 5% threshold
        limiter.record_batch(1, 10);
        assert_eq!(limiter.limit(), 16);
    }

    #[test]
    fn test_grow_needs_three_clean_batches() {
        let limiter = AdaptiveLimiter::new(20);
        limiter.record_batch(0, 10);
        limiter.record_batch(0, 10);
        assert_eq!(limiter.limit(), 20);
        limiter.record_batch(0, 10);
        assert_eq!(limiter.limit(), 22);
    }

    #[test]
    fn test_mild_throttle_resets_streak() {
        let limiter = AdaptiveLimiter::new(20);
        limiter.record_batch(0, 100);
        limiter.record_batch(0, 100);
        // 1% throttled: under threshold, but breaks the clean streak
        limiter.record_batch(1, 100);
        limiter.record_batch(0, 100);
        limiter.record_batch(0, 100);
        assert_eq!(limiter.limit(), 20);
        limiter.record_batch(0, 100);
        assert_eq!(limiter.limit(), 22);
    }

    #[test]
    fn test_initial_limit_clamped() {
        assert_eq!(AdaptiveLimiter::new(1).limit(), FETCH_CONCURRENCY_FLOOR);
        assert_eq!(AdaptiveLimiter::new(500).limit(), FETCH_CONCURRENCY_CEILING);
    }

    #[test]
    fn test_rate_limit_backoff_ladder() {
        assert_eq!(rate_limit_backoff(0), Duration::from_secs(5));
        assert_eq!(rate_limit_backoff(1), Duration::from_secs(10));
        assert_eq!(rate_limit_backoff(2), Duration::from_secs(20));
        assert_eq!(rate_limit_backoff(9), Duration::from_secs(20));
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(0), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(20), Duration::from_secs(30));
    }
}
