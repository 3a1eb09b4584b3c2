/// Structured error types for the walletscope pipeline
///
/// The taxonomy follows one rule: only integrity violations cross the
/// pipeline boundary. Transient upstream failures, malformed data and a
/// degraded cache backend are absorbed, counted in metrics and reflected
/// in per-record flags instead.

use thiserror::Error;

/// Upper bound on mints per market-cap batch lookup
pub const MAX_MARKET_CAP_BATCH: usize = 50;

// =============================================================================
// FATAL PIPELINE ERRORS
// =============================================================================

/// Errors that abort a pipeline run and surface to the caller
#[derive(Debug, Error)]
pub enum WalletscopeError {
    #[error("ledger RPC API key is not configured (set WALLETSCOPE_RPC_API_KEY)")]
    MissingApiKey,

    #[error("invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error(
        "signature pagination truncated: {consecutive} consecutive empty pages with cursor {cursor} still present"
    )]
    PaginationTruncated { consecutive: u32, cursor: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("market-cap batch too large: {0} mints (max {MAX_MARKET_CAP_BATCH})")]
    BatchTooLarge(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type WalletscopeResult<T> = Result<T, WalletscopeError>;

// =============================================================================
// ABSORBED API ERRORS
// =============================================================================

/// Errors from upstream HTTP/RPC calls. These never cross the pipeline
/// boundary; the unit of work is retried, then skipped and counted.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found")]
    NotFound,

    #[error("request timeout")]
    Timeout,
}

impl ApiError {
    /// Transient errors are worth retrying; the rest fail the unit of work
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::RateLimited | ApiError::Timeout)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// CACHE ERRORS
// =============================================================================

/// Durable-tier cache failures. Always absorbed by falling back to the
/// in-process tier; callers of the cache never see these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
