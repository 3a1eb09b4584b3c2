//! Structured logging for walletscope
//!
//! Tag-based logging with standard levels and per-tag debug gating:
//! - Error/Warning/Info are shown by default
//! - Debug requires the tag to be listed in the configured debug set
//! - Dual formatting: colored console output with aligned tag columns
//!
//! ## Usage
//!
//! ```rust
//! use walletscope::logger::{self, LogTag};
//!
//! logger::info(LogTag::Fetch, "Signature walk complete");
//! logger::warning(LogTag::Prices, "Provider returned no data");
//! logger::debug(LogTag::Cache, "Durable tier miss"); // gated
//! ```

mod format;
mod tags;

pub use tags::LogTag;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Log level definitions, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Runtime logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level threshold (Debug shows everything gated by tags)
    pub min_level: LogLevel,
    /// Tags with debug logging enabled (empty = none)
    pub debug_tags: HashSet<String>,
    /// Suppress all console output (used by tests)
    pub quiet: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            quiet: false,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Install a logger configuration. Call once at startup.
pub fn init(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Enable debug output for a set of tag keys (e.g. "fetch", "prices")
pub fn enable_debug_tags(tags: &[String]) {
    let mut config = LOGGER_CONFIG.write();
    for tag in tags {
        config.debug_tags.insert(tag.to_lowercase());
    }
}

fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = LOGGER_CONFIG.read();

    if config.quiet && level != LogLevel::Error {
        return false;
    }

    // Errors always log
    if level == LogLevel::Error {
        return true;
    }

    if level == LogLevel::Debug {
        return config.debug_tags.contains(tag.debug_key());
    }

    level <= config.min_level
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    format::format_and_log(tag, level, message);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, gated by the per-tag debug set
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_gating() {
        init(LoggerConfig {
            min_level: LogLevel::Info,
            debug_tags: ["fetch".to_string()].into_iter().collect(),
            quiet: true,
        });

        assert!(should_log(&LogTag::Fetch, LogLevel::Error));
        assert!(should_log(&LogTag::Fetch, LogLevel::Debug));
        assert!(!should_log(&LogTag::Prices, LogLevel::Debug));
    }
}
