//! Utility modules for logging, validation and graceful degradation

pub mod error;
pub mod logging;
pub mod validation;

// Re-export commonly used items
pub use error::{error_chain, with_fallback};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config, resolve_filter, DEFAULT_FILTER};
pub use validation::{ensure_fmt, ensure_identifier, ensure_not_empty};
