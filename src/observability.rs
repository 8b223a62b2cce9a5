//! Logging for evskim.
//!
//! evskim uses `tracing` for structured logging. All events use target "evskim"
//! and include an `event` field for filtering.
//!
//! The library never initializes a global subscriber; the `evskim` binary
//! installs `tracing_subscriber` with an `EnvFilter`.
//!
//! Conventions:
//! - `event`: snake_case event name (required)
//! - use `%` for Display, `?` for Debug formatting

/// Target for all evskim log events.
pub(crate) const EVSKIM_TARGET: &str = "evskim";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(event = "store_created", path = %path.display(), streams = n);
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::EVSKIM_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::EVSKIM_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::EVSKIM_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
