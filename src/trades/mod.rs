//! Trade extraction and record types
//!
//! - [`types`] - the `Trade` record, wire shapes and the result envelope
//! - [`extractor`] - dual-strategy parsing with dedup and dust filtering
//! - [`metrics`] - per-run extraction counters

pub mod extractor;
pub mod metrics;
pub mod types;

pub use extractor::TradeExtractor;
pub use metrics::ExtractionMetrics;
pub use types::{
    round_display, symbol_for_mint, PositionLink, TokenSide, Trade, TradeAction, TradeReport,
    TradeSummary, TradeWire,
};
