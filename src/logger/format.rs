//! Log formatting and output with ANSI colors
//!
//! Handles colorized console output with aligned tag and level columns
//! and broken-pipe-safe writes for piped commands.

use super::{LogLevel, LogTag};
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Column width for the tag field
const TAG_WIDTH: usize = 8;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let level_str = match level {
        LogLevel::Error => level.as_str().red().bold(),
        LogLevel::Warning => level.as_str().yellow(),
        LogLevel::Info => level.as_str().normal(),
        LogLevel::Debug => level.as_str().dimmed(),
    };

    let line = format!(
        "{} [{:<width$}] [{}] {}",
        time.dimmed(),
        tag.colored(),
        level_str,
        message,
        width = TAG_WIDTH
    );

    print_stdout_safe(&line);
}

/// Print to stdout, swallowing broken-pipe errors (e.g. `walletscope ... | head`)
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("logger write failed: {}", e);
        }
    }
}
