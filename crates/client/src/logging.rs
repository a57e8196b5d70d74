//! Logging for the notification client.
//!
//! Thin macros over `tracing` so every record from the connection layer lands
//! under one target and can be filtered with `RUST_LOG=sysnotify::ws=debug`.

/// Target shared by all connection-layer log records.
pub const LOG_TARGET: &str = "sysnotify::ws";

pub fn log_info_impl(msg: &str) {
    tracing::info!(target: LOG_TARGET, "{}", msg);
}

pub fn log_error_impl(msg: &str) {
    tracing::error!(target: LOG_TARGET, "{}", msg);
}

pub fn log_warn_impl(msg: &str) {
    tracing::warn!(target: LOG_TARGET, "{}", msg);
}

pub fn log_debug_impl(msg: &str) {
    tracing::debug!(target: LOG_TARGET, "{}", msg);
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info_impl(&format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error_impl(&format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_warn_impl(&format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug_impl(&format!($($arg)*))
    };
}
