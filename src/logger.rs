// Global diagnostic log for the block layer

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

/// Severity of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

static LOG: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());

/// Append a formatted line to the ring. Entries past MAX_LOG_ENTRIES are
/// dropped rather than evicting older ones.
pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    let mut line = String::new();
    let _ = fmt::write(&mut line, args);
    let mut entries = LOG.lock();
    if entries.len() < MAX_LOG_ENTRIES {
        entries.push((level, line));
    }
}

/// Snapshot of the collected diagnostics.
pub fn entries() -> Vec<(LogLevel, String)> {
    LOG.lock().clone()
}

pub fn count() -> usize {
    LOG.lock().len()
}

pub fn clear() {
    LOG.lock().clear();
}

// Macros for easier logging
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Info, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Error, core::format_args!($($arg)*))
    };
}
