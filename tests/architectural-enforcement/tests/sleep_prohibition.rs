//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Waiting happens on I/O, on a
//! shared construction future or on a shutdown signal, never on a timer.
//! **Exceptions**: test code.

use architectural_enforcement::{assert_clean, scan, PRODUCTION_DIRS};

fn is_sleep(code: &str) -> bool {
    code.contains("thread::sleep") || code.contains("time::sleep") || code.contains("sleep(")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(PRODUCTION_DIRS, is_sleep);
    assert_clean("sleep in production code", &violations);
}

#[test]
fn test_detector_flags_sleeps() {
    assert!(is_sleep("std::thread::sleep(Duration::from_millis(10));"));
    assert!(is_sleep("tokio::time::sleep(delay).await;"));
    assert!(!is_sleep("let timeout = config.engine_timeout();"));
}
