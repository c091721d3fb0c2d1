//! Error handling utilities for graceful degradation
//!
//! Provides helpers for common error handling patterns with logging and fallbacks.

use std::error::Error;

use tracing::warn;

/// Execute an operation with a fallback on error
///
/// Returns the result of the primary operation on success, or the fallback on error.
/// Logs a warning when fallback is used.
///
/// # Example
/// ```rust
/// use module_reconfig::utils::with_fallback;
///
/// let value: u64 = with_fallback(
///     || "not a number".parse::<u64>(),
///     || 5000,
///     "Invalid timeout, using default",
/// );
/// assert_eq!(value, 5000);
/// ```
pub fn with_fallback<F1, F2, T, E>(primary: F1, fallback: F2, context: &str) -> T
where
    F1: FnOnce() -> Result<T, E>,
    F2: FnOnce() -> T,
    E: std::fmt::Display,
{
    match primary() {
        Ok(value) => value,
        Err(e) => {
            warn!("{}: {}", context, e);
            fallback()
        }
    }
}

/// Render an error with all of its sources, outermost first
///
/// Strategy initialization errors wrap the runtime's own diagnostics as
/// sources; operators need both in a single log line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
