//! Integration Test: Panic-Free Production Code
//!
//! **Policy**: Production code propagates errors. `unwrap()` and `expect()`
//! belong in tests only.

use architectural_enforcement::{assert_clean, scan, PRODUCTION_DIRS};

fn is_panicking_unwrap(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(")
}

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = scan(PRODUCTION_DIRS, is_panicking_unwrap);
    assert_clean("unwrap()/expect() in production code", &violations);
}

#[test]
fn test_detector_ignores_fallible_combinators() {
    assert!(is_panicking_unwrap("let x = value.unwrap();"));
    assert!(is_panicking_unwrap("let x = value.expect(\"set\");"));
    assert!(!is_panicking_unwrap("let x = value.unwrap_or(16);"));
    assert!(!is_panicking_unwrap("let x = value.unwrap_or_default();"));
}
