/// Log tag definitions for module-level log routing
///
/// Each tag maps to a pipeline component and a stable debug key used by
/// the configuration layer (`WALLETSCOPE_DEBUG=fetch,prices`).

use colored::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Rpc,
    Fetch,
    Trades,
    Prices,
    Pool,
    Cache,
    Pnl,
    Stream,
    Config,
    System,
}

impl LogTag {
    /// Stable lowercase key used for debug gating
    pub fn debug_key(&self) -> &'static str {
        match self {
            LogTag::Rpc => "rpc",
            LogTag::Fetch => "fetch",
            LogTag::Trades => "trades",
            LogTag::Prices => "prices",
            LogTag::Pool => "pool",
            LogTag::Cache => "cache",
            LogTag::Pnl => "pnl",
            LogTag::Stream => "stream",
            LogTag::Config => "config",
            LogTag::System => "system",
        }
    }

    /// Uppercase display name for the console column
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Rpc => "RPC",
            LogTag::Fetch => "FETCH",
            LogTag::Trades => "TRADES",
            LogTag::Prices => "PRICES",
            LogTag::Pool => "POOL",
            LogTag::Cache => "CACHE",
            LogTag::Pnl => "PNL",
            LogTag::Stream => "STREAM",
            LogTag::Config => "CONFIG",
            LogTag::System => "SYSTEM",
        }
    }

    /// Colored display name for console output
    pub fn colored(&self) -> ColoredString {
        match self {
            LogTag::Rpc => self.as_str().bright_green(),
            LogTag::Fetch => self.as_str().bright_blue(),
            LogTag::Trades => self.as_str().bright_yellow(),
            LogTag::Prices => self.as_str().cyan(),
            LogTag::Pool => self.as_str().magenta(),
            LogTag::Cache => self.as_str().bright_cyan(),
            LogTag::Pnl => self.as_str().green(),
            LogTag::Stream => self.as_str().blue(),
            LogTag::Config => self.as_str().yellow(),
            LogTag::System => self.as_str().white(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
