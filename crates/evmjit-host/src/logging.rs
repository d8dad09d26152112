//! Logging runtime function implementation.
//!
//! Lets generated code emit diagnostics. Messages go straight to `tracing`,
//! tagged with the run id of the current execution context.

use evmjit_core::ExecutionContext;
use tracing::{debug, error, info, warn};

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Host implementation for the logging interface.
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    pub fn log(ctx: &ExecutionContext, level: LogLevel, message: &str) {
        let run_id = ctx.run_id.as_str();
        match level {
            LogLevel::Debug => debug!(run_id, guest_log = true, "{}", message),
            LogLevel::Info => info!(run_id, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(run_id, guest_log = true, "{}", message),
            LogLevel::Error => error!(run_id, guest_log = true, "{}", message),
        }
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// 0=debug, 1=info, 2=warn, 3=error; unknown values default to info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmjit_common::ExecutionConfig;

    #[test]
    fn test_log_does_not_panic() {
        let ctx = ExecutionContext::new("test-123".into(), &ExecutionConfig::default());

        LoggingHost::log(&ctx, LogLevel::Info, "Hello");
        LoggingHost::log(&ctx, LogLevel::Error, "World");
    }

    #[test]
    fn test_level_from_i32() {
        assert_eq!(level_from_i32(0), LogLevel::Debug);
        assert_eq!(level_from_i32(1), LogLevel::Info);
        assert_eq!(level_from_i32(2), LogLevel::Warn);
        assert_eq!(level_from_i32(3), LogLevel::Error);
        assert_eq!(level_from_i32(99), LogLevel::Info);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
