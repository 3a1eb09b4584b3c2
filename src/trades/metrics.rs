/// Extraction metrics for a single pipeline run
///
/// Reset at the start of every top-level fetch, read once at the end to
/// populate the result envelope. Never persisted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    /// Unique signatures produced by the paginator
    pub signatures_fetched: u64,
    /// Transaction bodies that reached the parser
    pub transactions_parsed: u64,
    /// Trades produced by the structured swap-event parser
    pub event_parser_trades: u64,
    /// Trades produced by the heuristic transfer parser
    pub transfer_parser_trades: u64,
    /// Second trades discarded for an already-seen signature
    pub duplicates: u64,
    /// Trades dropped below the dust threshold
    pub dust_filtered: u64,
    /// Bodies both parser strategies rejected
    pub parse_errors: u64,
    /// Bodies dropped by the candidate pre-filter
    pub prefiltered: u64,
    /// Signatures whose bodies could not be resolved upstream
    pub unresolved_transactions: u64,
    /// Batches abandoned after rate-limit backoff
    pub failed_batches: u64,
    /// Trades the pricing cascade could not price
    pub unpriced_trades: u64,
}

impl ExtractionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot as JSON for the result envelope
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
