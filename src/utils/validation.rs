//! Validation utilities
//!
//! Provides helpers for common validation patterns.

/// Ensure a condition is true with a formatted error message
///
/// # Example
/// ```rust
/// use module_reconfig::utils::ensure_fmt;
///
/// let value = 0;
/// let err = ensure_fmt(value > 0, || format!("value {} must be positive", value));
/// assert_eq!(err, Err("value 0 must be positive".to_string()));
/// ```
pub fn ensure_fmt<F>(condition: bool, message: F) -> Result<(), String>
where
    F: FnOnce() -> String,
{
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

/// Validate a collection is not empty
///
/// Returns `Ok(())` if value is not empty, error otherwise.
pub fn ensure_not_empty<T>(value: &[T], name: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{} must not be empty", name))
    } else {
        Ok(())
    }
}

/// Validate an identifier: non-empty and free of whitespace
///
/// Module and package names end up space-joined in manifest values, so a
/// name containing whitespace could never be parsed back.
pub fn ensure_identifier(value: &str, name: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{} must not be empty", name))
    } else if value.chars().any(char::is_whitespace) {
        Err(format!("{} must not contain whitespace, got '{}'", name, value))
    } else {
        Ok(())
    }
}
