//! Logging utilities
//!
//! Provides simple logging initialization that:
//! - Respects RUST_LOG environment variable
//! - Allows configuration via config file
//! - Supports JSON output behind the `json-logging` feature
//!
//! Initialization never panics: if a global subscriber is already installed
//! (by the host application or another test), an error is returned instead.
//!
//! # Usage
//!
//! ```rust
//! use module_reconfig::utils::init_logging;
//!
//! // Uses RUST_LOG or defaults to "info"
//! let _ = init_logging(None);
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter when neither RUST_LOG nor config provides one
pub const DEFAULT_FILTER: &str = "info";

/// Resolve the effective filter
///
/// RUST_LOG always takes precedence, then the config filter, then
/// [`DEFAULT_FILTER`].
pub fn resolve_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "module_reconfig=debug")
///   If None, uses RUST_LOG environment variable or defaults to "info"
pub fn init_logging(filter: Option<&str>) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(resolve_filter(filter))
        .try_init()
}

/// Initialize logging with JSON output (for log aggregation systems)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(resolve_filter(filter))
        .try_init()
}

/// Initialize logging from [`LoggingConfig`]
///
/// # Example
/// ```rust
/// use module_reconfig::config::ReconfigConfig;
/// use module_reconfig::utils::init_logging_from_config;
///
/// let config = ReconfigConfig::default();
/// let _ = init_logging_from_config(Some(&config.logging));
/// ```
pub fn init_logging_from_config(config: Option<&LoggingConfig>) -> Result<(), TryInitError> {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            return init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            tracing::debug!("json-logging feature not enabled, using human-readable logs");
        }
    }
    init_logging(filter)
}
