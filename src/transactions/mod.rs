//! Signature pagination and batch transaction fetching
//!
//! - [`paginator`] - walks the cursor-based signature listing to completion
//!   and refuses to silently accept a truncated history
//! - [`fetcher`] - resolves transaction bodies in concurrent batches with
//!   adaptive fan-out and batch-wide rate-limit recovery

pub mod fetcher;
pub mod paginator;

pub use fetcher::{BatchFetcher, FetchOutcome};
pub use paginator::SignaturePaginator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with in-flight fetch tasks.
/// Checked between pages and between batches; a cancelled run aborts
/// before any partial result is exposed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Progress callback invoked with human-readable status strings at
/// pipeline checkpoints
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// No-op progress callback
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}
