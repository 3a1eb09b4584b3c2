//! Profit-and-loss engine
//!
//! - [`fifo`] - FIFO lot queue, per-token positions, realized P&L applied
//!   inline while trades stream through in chronological order
//! - [`unrealized`] - open positions valued at current prices with
//!   staleness-degraded trust tiers

pub mod fifo;
pub mod unrealized;

pub use fifo::{FifoLedger, Lot, Position};
pub use unrealized::{compute_unrealized, degrade_by_age, FreshnessTier, UnrealizedPnl};
