//! Logging for the hotels pipeline
//!
//! Wraps `emit` with a terminal sink on stderr. Standard output stays free
//! for query results.
//!
//! Usage:
//! - Set HOTELS_LOG=off (default) - no logs
//! - Set HOTELS_LOG=info - stage boundaries and table outcomes
//! - Set HOTELS_LOG=debug - SQL text, storage locations

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the log level
pub const LOG_ENV_VAR: &str = "HOTELS_LOG";

static INIT: Once = Once::new();

/// What a `HOTELS_LOG` value asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Off,
    Min(emit::Level),
    /// Unrecognized value, falls back to info
    Unknown,
}

/// Parse a `HOTELS_LOG` value. Matching is case-insensitive.
pub fn parse_log_setting(value: &str) -> LogSetting {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => LogSetting::Off,
        "debug" => LogSetting::Min(emit::Level::Debug),
        "info" => LogSetting::Min(emit::Level::Info),
        "warn" => LogSetting::Min(emit::Level::Warn),
        "error" => LogSetting::Min(emit::Level::Error),
        _ => LogSetting::Unknown,
    }
}

/// Initialize diagnostics based on the HOTELS_LOG environment variable
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV_VAR).unwrap_or_default();

        let min = match parse_log_setting(&raw) {
            LogSetting::Off => return,
            LogSetting::Min(level) => level,
            LogSetting::Unknown => emit::Level::Info,
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        if parse_log_setting(&raw) == LogSetting::Unknown {
            emit::warn!("unknown {var} value {raw}, using info", var: LOG_ENV_VAR, raw);
        }

        // The runtime lives for the whole process.
        std::mem::forget(rt);
    });
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

/// Stage boundaries and outcomes a user running the pipeline wants to see.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// SQL text, storage locations, row counts.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_parse_log_setting() {
        assert_eq!(parse_log_setting(""), LogSetting::Off);
        assert_eq!(parse_log_setting("off"), LogSetting::Off);
        assert_eq!(
            parse_log_setting("DEBUG"),
            LogSetting::Min(emit::Level::Debug)
        );
        assert_eq!(
            parse_log_setting(" info "),
            LogSetting::Min(emit::Level::Info)
        );
        assert_eq!(parse_log_setting("warn"), LogSetting::Min(emit::Level::Warn));
        assert_eq!(
            parse_log_setting("error"),
            LogSetting::Min(emit::Level::Error)
        );
        assert_eq!(parse_log_setting("verbose"), LogSetting::Unknown);
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
