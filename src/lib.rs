#![allow(warnings)]

pub mod cache;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod pnl;
pub mod prices;
pub mod rpc;
pub mod service;
pub mod stream; // Typed event stream for the serving layer
pub mod trades;
pub mod transactions;
