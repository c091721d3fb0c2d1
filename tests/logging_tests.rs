//! Global subscriber installation; serialized since it touches process state

use module_reconfig::config::LoggingConfig;
use module_reconfig::utils::{init_logging, init_logging_from_config, resolve_filter};
use serial_test::serial;

#[test]
#[serial]
fn test_second_initialization_is_an_error_not_a_panic() {
    let config = LoggingConfig {
        filter: Some("module_reconfig=debug".to_string()),
        json_format: false,
    };
    // Another test in this binary may already have installed one
    let _ = init_logging_from_config(Some(&config));

    assert!(init_logging(None).is_err());
    assert!(init_logging_from_config(None).is_err());
}

#[test]
#[serial]
fn test_rust_log_takes_precedence() {
    let previous = std::env::var("RUST_LOG").ok();

    std::env::set_var("RUST_LOG", "warn");
    assert_eq!(resolve_filter(Some("trace")).to_string(), "warn");

    std::env::remove_var("RUST_LOG");
    assert_eq!(resolve_filter(Some("module_reconfig=trace")).to_string(), "module_reconfig=trace");
    assert_eq!(resolve_filter(None).to_string(), "info");

    if let Some(previous) = previous {
        std::env::set_var("RUST_LOG", previous);
    }
}
