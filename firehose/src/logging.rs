use std::sync::OnceLock;

/// A wrapper that defers hex encoding until Display is called
/// This avoids the cost of hex encoding when logging is disabled
pub struct HexView<T: AsRef<[u8]>>(pub T);

impl<T: AsRef<[u8]>> std::fmt::Display for HexView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_ref()))
    }
}

/// Environment variable controlling the verbosity of the instrumentation's own diagnostics
pub const LOG_LEVEL_ENV: &str = "FIREHOSE_ETHEREUM_TRACER_LOG_LEVEL";

/// Firehose instrumentation log levels:
/// - Info: block start/end + trx start/end
/// - Debug: Info + call start/end + flush
/// - Trace: Debug + balance, nonce, code, storage, gas changes
/// - TraceFull: Trace + keccak preimages
///
/// These only gate diagnostics sent to `tracing`, never the trace lines themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FirehoseLogLevel {
    Disabled,
    Info,
    Debug,
    Trace,
    TraceFull,
}

impl FirehoseLogLevel {
    fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            "trace_full" => Self::TraceFull,
            _ => Self::Disabled,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Info => 1,
            Self::Debug => 2,
            Self::Trace => 3,
            Self::TraceFull => 4,
        }
    }

    fn enables(self, wanted: Self) -> bool {
        wanted != Self::Disabled && self.rank() >= wanted.rank()
    }
}

static FIREHOSE_LOG_LEVEL: OnceLock<FirehoseLogLevel> = OnceLock::new();

fn firehose_log_level() -> FirehoseLogLevel {
    *FIREHOSE_LOG_LEVEL.get_or_init(|| {
        std::env::var(LOG_LEVEL_ENV)
            .map(|level| FirehoseLogLevel::from_env_str(&level))
            .unwrap_or(FirehoseLogLevel::Disabled)
    })
}

#[inline]
pub fn is_firehose_info_enabled() -> bool {
    firehose_log_level().enables(FirehoseLogLevel::Info)
}

#[inline]
pub fn is_firehose_debug_enabled() -> bool {
    firehose_log_level().enables(FirehoseLogLevel::Debug)
}

#[inline]
pub fn is_firehose_trace_enabled() -> bool {
    firehose_log_level().enables(FirehoseLogLevel::Trace)
}

#[inline]
pub fn is_firehose_trace_full_enabled() -> bool {
    firehose_log_level().enables(FirehoseLogLevel::TraceFull)
}

/// Firehose info-level diagnostic, arguments are only evaluated when enabled
#[macro_export]
macro_rules! firehose_info {
    ($($arg:tt)*) => {
        if $crate::logging::is_firehose_info_enabled() {
            $crate::__tracing::info!(target: "firehose", $($arg)*);
        }
    };
}

/// Firehose debug-level diagnostic, arguments are only evaluated when enabled
#[macro_export]
macro_rules! firehose_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_firehose_debug_enabled() {
            $crate::__tracing::debug!(target: "firehose", $($arg)*);
        }
    };
}

/// Firehose trace-level diagnostic, arguments are only evaluated when enabled
#[macro_export]
macro_rules! firehose_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_firehose_trace_enabled() {
            $crate::__tracing::trace!(target: "firehose", $($arg)*);
        }
    };
}

/// Firehose trace-full diagnostic, arguments are only evaluated when enabled
#[macro_export]
macro_rules! firehose_trace_full {
    ($($arg:tt)*) => {
        if $crate::logging::is_firehose_trace_full_enabled() {
            $crate::__tracing::trace!(target: "firehose", $($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(FirehoseLogLevel::from_env_str("info"), FirehoseLogLevel::Info);
        assert_eq!(FirehoseLogLevel::from_env_str("DEBUG"), FirehoseLogLevel::Debug);
        assert_eq!(FirehoseLogLevel::from_env_str("trace"), FirehoseLogLevel::Trace);
        assert_eq!(
            FirehoseLogLevel::from_env_str("trace_full"),
            FirehoseLogLevel::TraceFull
        );
        assert_eq!(FirehoseLogLevel::from_env_str("verbose"), FirehoseLogLevel::Disabled);
        assert_eq!(FirehoseLogLevel::from_env_str(""), FirehoseLogLevel::Disabled);
    }

    #[test]
    fn test_log_level_enablement() {
        let debug = FirehoseLogLevel::Debug;
        assert!(debug.enables(FirehoseLogLevel::Info));
        assert!(debug.enables(FirehoseLogLevel::Debug));
        assert!(!debug.enables(FirehoseLogLevel::Trace));

        let trace_full = FirehoseLogLevel::TraceFull;
        assert!(trace_full.enables(FirehoseLogLevel::Trace));
        assert!(trace_full.enables(FirehoseLogLevel::TraceFull));

        let disabled = FirehoseLogLevel::Disabled;
        assert!(!disabled.enables(FirehoseLogLevel::Info));
        assert!(!disabled.enables(FirehoseLogLevel::Disabled));
    }

    #[test]
    fn test_hex_view() {
        let data = vec![0x42, 0xff, 0x00, 0xab];
        assert_eq!(format!("{}", HexView(&data)), "42ff00ab");
        assert_eq!(format!("{}", HexView([0x12, 0x34])), "1234");
    }
}
